//! Dotted-path addressing into the `static` variable tree.
//!
//! ```text
//! player.hp          → {"player": {"hp": …}}
//! inventory.0        → {"inventory": [ … ]}
//! party[1].name      → {"party": [_, {"name": …}]}
//! ```
//!
//! Writes create missing containers on the way down: an array when the next
//! segment is an index, an object otherwise. Primitive intermediates are
//! replaced. Writing past the end of an array pads it with `null`, up to
//! [`MAX_ARRAY_PAD`] new slots. A failed write leaves the tree unchanged.

use serde_json::{Map, Value};

use crate::error::PathError;

/// How many `null` slots a single write may add to an array.
pub const MAX_ARRAY_PAD: usize = 10_000;

/// One step of a [`StatePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// An object key (may still address an array when it reads as an index).
    Key(String),
    /// A bracketed array index, `[n]`.
    Index(usize),
}

impl Segment {
    /// The array position this segment addresses, if any.
    ///
    /// Keys count as indices only in canonical form (`0`, `12`, not `012`).
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(i) => Some(*i),
            Segment::Key(k) => {
                let canonical = k == "0"
                    || (!k.is_empty() && !k.starts_with('0') && k.bytes().all(|b| b.is_ascii_digit()));
                if canonical { k.parse().ok() } else { None }
            }
        }
    }

    fn key(&self) -> String {
        match self {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        }
    }
}

/// A parsed dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePath {
    raw: String,
    segments: Vec<Segment>,
}

impl StatePath {
    /// Parse `a.b[0].c` style paths.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let raw = path.trim();
        if raw.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        for part in raw.split('.') {
            let (name, mut brackets) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };

            if name.is_empty() && brackets.is_empty() {
                return Err(PathError::EmptySegment { path: raw.to_string() });
            }
            if !name.is_empty() {
                segments.push(Segment::Key(name.to_string()));
            }

            while !brackets.is_empty() {
                let bad = || PathError::BadIndex { path: raw.to_string() };
                let inner = brackets.strip_prefix('[').ok_or_else(bad)?;
                let close = inner.find(']').ok_or_else(bad)?;
                let index = inner[..close].trim().parse::<usize>().map_err(|_| bad())?;
                segments.push(Segment::Index(index));
                brackets = &inner[close + 1..];
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Look up the value at this path.
    pub fn get<'a>(&self, root: &'a Map<String, Value>) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut node = root.get(&first.key())?;
        for segment in rest {
            node = child(node, segment)?;
        }
        Some(node)
    }

    pub fn get_mut<'a>(&self, root: &'a mut Map<String, Value>) -> Option<&'a mut Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut node = root.get_mut(&first.key())?;
        for segment in rest {
            node = match node {
                Value::Object(map) => map.get_mut(&segment.key())?,
                Value::Array(items) => items.get_mut(segment.as_index()?)?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Whether a value exists at this path.
    pub fn has(&self, root: &Map<String, Value>) -> bool {
        self.get(root).is_some()
    }

    /// Write `value` at this path, creating containers as needed.
    pub fn set(&self, root: &mut Map<String, Value>, value: Value) -> Result<(), PathError> {
        let mut tree = Value::Object(root.clone());
        set_in(&mut tree, &self.segments, value, &self.raw)?;
        if let Value::Object(map) = tree {
            *root = map;
        }
        Ok(())
    }
}

impl std::fmt::Display for StatePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for StatePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn child<'a>(node: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(&segment.key()),
        Value::Array(items) => items.get(segment.as_index()?),
        _ => None,
    }
}

fn slot<'a>(node: &'a mut Value, segment: &Segment, path: &str) -> Result<&'a mut Value, PathError> {
    match node {
        Value::Object(map) => Ok(map.entry(segment.key()).or_insert(Value::Null)),
        Value::Array(items) => {
            let index = segment.as_index().ok_or_else(|| PathError::KeyOnArray {
                path: path.to_string(),
                key: segment.key(),
            })?;
            if index >= items.len() {
                let too_large = || PathError::IndexTooLarge {
                    path: path.to_string(),
                    index,
                };
                if index - items.len() >= MAX_ARRAY_PAD {
                    return Err(too_large());
                }
                let len = index.checked_add(1).ok_or_else(too_large)?;
                items.resize(len, Value::Null);
            }
            Ok(&mut items[index])
        }
        // Callers only descend into containers.
        _ => Err(PathError::KeyOnArray {
            path: path.to_string(),
            key: segment.key(),
        }),
    }
}

fn set_in(node: &mut Value, segments: &[Segment], value: Value, path: &str) -> Result<(), PathError> {
    let Some((first, rest)) = segments.split_first() else {
        return Err(PathError::Empty);
    };

    let target = slot(node, first, path)?;
    match rest.first() {
        None => {
            *target = value;
            Ok(())
        }
        Some(next) => {
            if !target.is_object() && !target.is_array() {
                *target = if next.as_index().is_some() {
                    Value::Array(Vec::new())
                } else {
                    Value::Object(Map::new())
                };
            }
            set_in(target, rest, value, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test tree must be an object"),
        }
    }

    #[test]
    fn parses_keys_and_indices() {
        let path = StatePath::parse("party[1].name").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("party".into()),
                Segment::Index(1),
                Segment::Key("name".into()),
            ]
        );
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!(StatePath::parse("  "), Err(PathError::Empty));
        assert!(matches!(
            StatePath::parse("a..b"),
            Err(PathError::EmptySegment { .. })
        ));
        assert!(matches!(StatePath::parse("a[x]"), Err(PathError::BadIndex { .. })));
        assert!(matches!(StatePath::parse("a[1"), Err(PathError::BadIndex { .. })));
    }

    #[test]
    fn set_creates_nested_objects() {
        let mut root = Map::new();
        StatePath::parse("a.b").unwrap().set(&mut root, json!(5)).unwrap();
        assert_eq!(Value::Object(root), json!({"a": {"b": 5}}));
    }

    #[test]
    fn set_creates_arrays_for_index_segments() {
        let mut root = Map::new();
        StatePath::parse("list.1").unwrap().set(&mut root, json!("x")).unwrap();
        assert_eq!(Value::Object(root), json!({"list": [null, "x"]}));
    }

    #[test]
    fn set_replaces_primitive_intermediates() {
        let mut root = tree(json!({"a": 3}));
        StatePath::parse("a.b").unwrap().set(&mut root, json!(true)).unwrap();
        assert_eq!(Value::Object(root), json!({"a": {"b": true}}));
    }

    #[test]
    fn set_rejects_named_key_on_array() {
        let mut root = tree(json!({"tags": ["a"]}));
        let err = StatePath::parse("tags.color")
            .unwrap()
            .set(&mut root, json!(1))
            .unwrap_err();
        assert!(matches!(err, PathError::KeyOnArray { .. }));
        assert_eq!(Value::Object(root), json!({"tags": ["a"]}));
    }

    #[test]
    fn get_and_has_follow_the_tree() {
        let root = tree(json!({"party": [{"name": "Ayla"}], "gold": 0}));
        let name = StatePath::parse("party[0].name").unwrap();
        assert_eq!(name.get(&root), Some(&json!("Ayla")));
        assert!(name.has(&root));
        assert!(StatePath::parse("gold").unwrap().has(&root));
        assert!(!StatePath::parse("party.3").unwrap().has(&root));
        assert!(!StatePath::parse("gold.coins").unwrap().has(&root));
    }

    #[test]
    fn set_refuses_huge_indices_and_keeps_the_tree() {
        let mut root = tree(json!({"list": [1]}));
        let err = StatePath::parse("list.4000000000")
            .unwrap()
            .set(&mut root, json!("x"))
            .unwrap_err();
        assert!(matches!(err, PathError::IndexTooLarge { index: 4_000_000_000, .. }));
        assert!(matches!(
            StatePath::parse(&format!("list[{}]", usize::MAX))
                .unwrap()
                .set(&mut root, json!("x")),
            Err(PathError::IndexTooLarge { .. })
        ));

        // Nothing is created on the way down either.
        assert!(StatePath::parse("fresh.99999").unwrap().set(&mut root, json!(1)).is_err());
        assert_eq!(Value::Object(root.clone()), json!({"list": [1]}));

        StatePath::parse("list.3").unwrap().set(&mut root, json!(2)).unwrap();
        assert_eq!(root["list"], json!([1, null, null, 2]));
    }

    #[test]
    fn get_mut_edits_in_place() {
        let mut root = tree(json!({"party": [{"hp": 1}]}));
        let hp = StatePath::parse("party.0.hp").unwrap();
        *hp.get_mut(&mut root).unwrap() = json!(9);
        assert_eq!(Value::Object(root.clone()), json!({"party": [{"hp": 9}]}));
        assert!(StatePath::parse("party.1").unwrap().get_mut(&mut root).is_none());
    }

    #[test]
    fn non_canonical_numeric_keys_are_object_keys() {
        let mut root = Map::new();
        StatePath::parse("codes.007").unwrap().set(&mut root, json!(1)).unwrap();
        assert_eq!(Value::Object(root), json!({"codes": {"007": 1}}));
    }
}
