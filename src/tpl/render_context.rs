use crate::error::TplError;
use crate::value::serializer::to_value;
use crate::value::{Map, ToValue, Value};
use serde::Serialize;

/// The mapping of names to values a template renders against.
///
/// Iteration follows insertion order. Rendering never mutates the caller's
/// context: the engine works on its own copy, and loop bodies shadow names
/// through [`Context::checkpoint`] / [`Context::rollback`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: Map,
}

/// Saved state of a set of names, taken before they are shadowed.
/// `None` records that the name was absent.
#[derive(Debug)]
#[must_use = "a checkpoint must be rolled back to restore shadowed names"]
pub struct Checkpoint {
    saved: Vec<(String, Option<Value>)>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from any serializable struct or map.
    pub fn from_serialize<T: ?Sized + Serialize>(value: &T) -> crate::Result<Self> {
        match to_value(value)? {
            Value::Map(vars) => Ok(Self { vars }),
            other => Err(TplError::InvalidContext(format!(
                "expected a struct or map at the top level, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn insert<K: Into<String>, V: ToValue + ?Sized>(&mut self, key: K, value: &V) {
        self.vars.insert(key.into(), value.to_value());
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Removes `key`, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.vars.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    /// Overlays `other` onto this context; `other` wins on key collisions.
    pub fn merge(&mut self, other: Context) {
        self.vars.extend(other.vars);
    }

    pub fn into_value(self) -> Value {
        Value::Map(self.vars)
    }

    /// Records the current binding (or absence) of each name.
    pub fn checkpoint(&self, names: &[&str]) -> Checkpoint {
        Checkpoint {
            saved: names
                .iter()
                .map(|n| (n.to_string(), self.vars.get(*n).cloned()))
                .collect(),
        }
    }

    /// Restores the names recorded in `cp`: previous values come back,
    /// names that were absent are removed again.
    pub fn rollback(&mut self, cp: Checkpoint) {
        for (name, saved) in cp.saved.into_iter().rev() {
            match saved {
                Some(v) => {
                    self.vars.insert(name, v);
                }
                None => {
                    self.vars.shift_remove(&name);
                }
            }
        }
    }
}

impl From<Map> for Context {
    fn from(vars: Map) -> Self {
        Self { vars }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<K: Into<String>> Extend<(K, Value)> for Context {
    fn extend<I: IntoIterator<Item = (K, Value)>>(&mut self, iter: I) {
        self.vars
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v)));
    }
}

impl ToValue for Context {
    fn to_value(&self) -> Value {
        Value::Map(self.vars.clone())
    }
}

/// Builds a [`Context`] from `key => value` pairs; values go through
/// [`ToValue`].
///
/// ```
/// let ctx = jvpug::context! { name => "Jane", items => vec!["a", "b"] };
/// assert_eq!(ctx.len(), 2);
/// ```
#[macro_export]
macro_rules! context {
    () => {
        $crate::Context::new()
    };
    ($($key:ident => $value:expr),+ $(,)?) => {{
        let mut ctx = $crate::Context::new();
        $(
            ctx.insert(stringify!($key), &$value);
        )+
        ctx
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut ctx = Context::new();
        ctx.insert("a", &1);
        ctx.insert("name", "Jane");
        assert_eq!(ctx.get("a"), Some(&Value::Int(1)));
        assert_eq!(ctx.get("name"), Some(&Value::Str("Jane".to_string())));
        assert_eq!(ctx.get("b"), None);
    }

    #[test]
    fn test_rollback_restores_shadowed_value() {
        let mut ctx = context! { item => "outer", other => 1 };
        let before = ctx.clone();

        let cp = ctx.checkpoint(&["item"]);
        ctx.set("item", Value::Int(42));
        ctx.rollback(cp);

        assert_eq!(ctx, before);
    }

    #[test]
    fn test_rollback_removes_introduced_names() {
        let mut ctx = context! { a => 1, b => 2 };
        let before = ctx.clone();

        let cp = ctx.checkpoint(&["k", "v"]);
        ctx.set("k", Value::Null);
        ctx.set("v", Value::Int(3));
        ctx.rollback(cp);

        assert!(!ctx.contains_key("k"));
        assert!(!ctx.contains_key("v"));
        assert_eq!(ctx, before);
    }

    #[test]
    fn test_rollback_keeps_key_order() {
        let mut ctx = context! { a => 1, b => 2, c => 3 };
        let cp = ctx.checkpoint(&["b"]);
        ctx.set("b", Value::Int(20));
        ctx.rollback(cp);
        let keys: Vec<&String> = ctx.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_overlays() {
        let mut ctx = context! { a => 1, b => 2 };
        ctx.merge(context! { b => 3, c => 4 });
        assert_eq!(ctx.get("b"), Some(&Value::Int(3)));
        assert_eq!(ctx.len(), 3);
    }

    #[test]
    fn test_from_serialize_requires_map() {
        #[derive(Serialize)]
        struct Page {
            title: String,
        }
        let ctx = Context::from_serialize(&Page {
            title: "Home".to_string(),
        })
        .unwrap();
        assert_eq!(ctx.get("title"), Some(&Value::Str("Home".to_string())));

        assert!(matches!(
            Context::from_serialize(&vec![1, 2]),
            Err(TplError::InvalidContext(_))
        ));
    }
}
