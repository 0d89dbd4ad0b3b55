mod to_value;

use proc_macro::TokenStream;

/// Derives `jvpug::ToValue` for a struct with named fields.
///
/// The generated value is a `Value::Map` whose keys follow field declaration
/// order. Field attributes:
/// - `#[value("key")]` / `#[value(rename = "key")]` renames the key.
/// - `#[value(skip)]` leaves the field out of the map.
#[proc_macro_derive(ToValue, attributes(value))]
pub fn derive_to_value(input: TokenStream) -> TokenStream {
    to_value::derive_to_value_impl(input)
}
