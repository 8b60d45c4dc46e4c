//! Store-backed asset lookups.
//!
//! Before `hotfix_numeric_assets` ids are derived from names on the fly.
//! After it, the `assets` record set is the source of truth: a name that
//! was never issued has no id, even if it would decode to one.

use tracing::warn;

use super::codec::{id_to_name, name_to_id};
use super::subasset::parse_subasset;
use super::{AssetError, AssetId, AssetResult};
use crate::config::{BTC, XCP};
use crate::context::BlockContext;
use crate::storage::{AssetRecord, Store, StoreExt};

const HOTFIX_NUMERIC_ASSETS: &str = "hotfix_numeric_assets";
const SUBASSETS: &str = "subassets";

/// Id of the asset called `name`.
///
/// # Errors
///
/// [`AssetError::NoSuchAsset`] after the hotfix when `name` is not
/// registered; codec errors before it.
pub fn asset_id<S: Store + ?Sized>(store: &S, ctx: &BlockContext, name: &str) -> AssetResult<AssetId> {
    if !ctx.enabled(HOTFIX_NUMERIC_ASSETS)? {
        return name_to_id(name, ctx.schedule(), ctx.height());
    }
    match name {
        BTC => return Ok(AssetId::BTC),
        XCP => return Ok(AssetId::XCP),
        _ => {}
    }
    store
        .fetch::<AssetRecord>(name.as_bytes())?
        .map(|record| AssetId(record.asset_id))
        .ok_or_else(|| AssetError::NoSuchAsset(name.to_string()))
}

/// Name of the asset with id `id`, or `None` if the hotfix is active and
/// no asset carries that id.
pub fn asset_name<S: Store + ?Sized>(store: &S, ctx: &BlockContext, id: AssetId) -> AssetResult<Option<String>> {
    if !ctx.enabled(HOTFIX_NUMERIC_ASSETS)? {
        return id_to_name(id, ctx.schedule(), ctx.height()).map(Some);
    }
    match id {
        AssetId::BTC => return Ok(Some(BTC.to_string())),
        AssetId::XCP => return Ok(Some(XCP.to_string())),
        _ => {}
    }
    Ok(store
        .load_all::<AssetRecord>()?
        .into_iter()
        .find(|record| record.asset_id == id.0)
        .map(|record| record.asset_name))
}

/// Maps a sub-asset long name to the registered (numeric) asset name.
///
/// Names that are not long names, long names that were never issued, and
/// any name while sub-assets are inactive come back unchanged. A malformed
/// long name is logged and also returned unchanged.
pub fn resolve_subasset_longname<S: Store + ?Sized>(
    store: &S,
    ctx: &BlockContext,
    name: &str,
) -> AssetResult<String> {
    if !ctx.enabled(SUBASSETS)? {
        return Ok(name.to_string());
    }

    let long_name = match parse_subasset(name) {
        Ok(Some((_, long_name))) => long_name,
        Ok(None) => return Ok(name.to_string()),
        Err(e) => {
            warn!(name, error = %e, "invalid sub-asset long name");
            return Ok(name.to_string());
        }
    };

    let registered = store
        .load_all::<AssetRecord>()?
        .into_iter()
        .find(|record| record.asset_longname.as_deref() == Some(long_name.as_str()));
    Ok(registered.map_or_else(|| name.to_string(), |record| record.asset_name))
}
