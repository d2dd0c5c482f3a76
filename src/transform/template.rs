//! JavaScript fragments emitted by the metadata transform.
//!
//! Everything in this module is generated text. The header statement
//! declares three bindings:
//!
//! - `s`, the well-known registry symbol
//! - `m`, the registry slot, created on first use
//! - `r`, a factory for URL accessor objects exposing `with`, `url` and
//!   `resolve`

use crate::utils;

/// Expression for the well-known registry symbol.
pub const META_SYMBOL_JS: &str = "Symbol.for(\"import.meta\")";

/// Statement injected after each component entry point to publish the
/// component's props into the registry slot.
pub const PROPS_JS: &str = "globalThis[Symbol.for(\"import.meta\")].props=$$props;";

/// Join expressions with commas.
pub fn comma_join<I>(values: I) -> String
where
    I: IntoIterator<Item = String>,
{
    values.into_iter().collect::<Vec<_>>().join(",")
}

/// Join statements with semicolons. Empty members survive as empty
/// statements.
pub fn curly_join<I>(values: I) -> String
where
    I: IntoIterator<Item = String>,
{
    values.into_iter().collect::<Vec<_>>().join(";")
}

/// The header's `let` statement. Seeds the registry slot when absent so
/// injected accessors never observe a missing slot, and installs the
/// accessor factory.
///
/// `with(id)` registers an asset through the `m.assets` bridge the host
/// runtime wires into the slot, and returns its public hashed path.
pub fn header_js(assets_name: &str, base_name: &str) -> String {
    let seed = format!(
        "{{assetsName:{},baseName:{},fileHref:\"\",pageHref:\"\",requestHref:\"\",siteHref:\"\",props:{{}}}}",
        utils::js_string(assets_name),
        utils::js_string(base_name),
    );
    let factory = comma_join([
        "with(id){return '/' + m.assetsName + '/' + m.assets.add(this.resolve(id)).hashname}"
            .to_string(),
        "get url(){return r}".to_string(),
        "get resolve(){return ((...paths) => paths.reduce((u,p) => new URL(p, u), new URL(r, \"file:\")).pathname).bind(null)}"
            .to_string(),
    ]);
    format!(
        "let {}",
        comma_join([
            format!("s={META_SYMBOL_JS}"),
            format!("m=globalThis[s]||(globalThis[s]={seed})"),
            format!("r=r=>({{{factory}}})"),
        ])
    )
}
