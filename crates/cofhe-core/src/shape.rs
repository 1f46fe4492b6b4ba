//! Nested input structures and the Extract/Replace walks over them.
//!
//! Callers hand the encrypt pipeline an arbitrarily nested value in which some
//! leaves are [`EncryptableItem`]s. The tree is modelled as a closed
//! [`Shape`] so both walks are plain recursion with no reflection.
//!
//! ## Ordering
//!
//! Both walks are depth-first, left-to-right: sequence elements in index order
//! and record fields in insertion order. Replace consumes verified handles in
//! exactly the order Extract produced the items, so the i-th extracted item is
//! replaced by the i-th handle.

use std::collections::VecDeque;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::encryptable::{CoFheInItem, EncryptableItem};
use crate::error::{CoreError, Result};

/// A tree of leaves, sequences, and ordered records.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape<L> {
    Leaf(L),
    Sequence(Vec<Shape<L>>),
    Record(Vec<(String, Shape<L>)>),
}

impl<L> Shape<L> {
    /// Build a sequence node.
    pub fn sequence(items: impl IntoIterator<Item = Shape<L>>) -> Self {
        Shape::Sequence(items.into_iter().collect())
    }

    /// Build a record node, keeping field order.
    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Shape<L>)>) -> Self {
        Shape::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Visit every leaf in traversal order.
    pub fn visit<F: FnMut(&L)>(&self, f: &mut F) {
        match self {
            Shape::Leaf(leaf) => f(leaf),
            Shape::Sequence(items) => {
                for item in items {
                    item.visit(f);
                }
            }
            Shape::Record(fields) => {
                for (_, value) in fields {
                    value.visit(f);
                }
            }
        }
    }

    /// Rebuild the tree with every leaf mapped, stopping at the first error.
    pub fn try_map<M, E, F>(&self, f: &mut F) -> std::result::Result<Shape<M>, E>
    where
        F: FnMut(&L) -> std::result::Result<M, E>,
    {
        Ok(match self {
            Shape::Leaf(leaf) => Shape::Leaf(f(leaf)?),
            Shape::Sequence(items) => Shape::Sequence(
                items
                    .iter()
                    .map(|item| item.try_map(&mut *f))
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Shape::Record(fields) => Shape::Record(
                fields
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), value.try_map(&mut *f)?)))
                    .collect::<std::result::Result<_, _>>()?,
            ),
        })
    }

    pub fn as_leaf(&self) -> Option<&L> {
        match self {
            Shape::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Shape<L>]> {
        match self {
            Shape::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&Shape<L>> {
        match self {
            Shape::Record(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl<L: Serialize> Serialize for Shape<L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Shape::Leaf(leaf) => leaf.serialize(serializer),
            Shape::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Shape::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// A leaf of a caller's input: either something to encrypt or a pass-through value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InputLeaf {
    Encryptable(EncryptableItem),
    Plain(serde_json::Value),
}

/// A leaf of the pipeline output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputLeaf {
    Encrypted(CoFheInItem),
    Plain(serde_json::Value),
}

impl OutputLeaf {
    pub fn as_encrypted(&self) -> Option<&CoFheInItem> {
        match self {
            OutputLeaf::Encrypted(item) => Some(item),
            OutputLeaf::Plain(_) => None,
        }
    }
}

pub type EncryptInput = Shape<InputLeaf>;
pub type EncryptOutput = Shape<OutputLeaf>;

impl Shape<InputLeaf> {
    /// A pass-through leaf.
    pub fn plain(value: impl Into<serde_json::Value>) -> Self {
        Shape::Leaf(InputLeaf::Plain(value.into()))
    }
}

impl From<EncryptableItem> for Shape<InputLeaf> {
    fn from(item: EncryptableItem) -> Self {
        Shape::Leaf(InputLeaf::Encryptable(item))
    }
}

impl From<Vec<EncryptableItem>> for Shape<InputLeaf> {
    fn from(items: Vec<EncryptableItem>) -> Self {
        Shape::Sequence(items.into_iter().map(Shape::from).collect())
    }
}

impl Shape<OutputLeaf> {
    /// The encrypted handle at this node, if it is one.
    pub fn as_encrypted(&self) -> Option<&CoFheInItem> {
        self.as_leaf().and_then(OutputLeaf::as_encrypted)
    }
}

/// Collect every encryptable leaf, in traversal order.
pub fn encrypt_extract(input: &EncryptInput) -> Vec<EncryptableItem> {
    let mut items = Vec::new();
    input.visit(&mut |leaf| {
        if let InputLeaf::Encryptable(item) = leaf {
            items.push(*item);
        }
    });
    items
}

/// Substitute verified handles for encryptable leaves, in traversal order.
///
/// Returns the rebuilt structure together with any handles left unconsumed.
/// Running out of handles before the walk ends is an error.
pub fn encrypt_replace(
    input: &EncryptInput,
    in_items: Vec<CoFheInItem>,
) -> Result<(EncryptOutput, Vec<CoFheInItem>)> {
    let mut queue: VecDeque<CoFheInItem> = in_items.into();
    let mut position = 0usize;

    let output = input.try_map(&mut |leaf| -> Result<OutputLeaf> {
        match leaf {
            InputLeaf::Encryptable(_) => {
                let item = queue
                    .pop_front()
                    .ok_or(CoreError::MissingInItem(position))?;
                position += 1;
                Ok(OutputLeaf::Encrypted(item))
            }
            InputLeaf::Plain(value) => Ok(OutputLeaf::Plain(value.clone())),
        }
    })?;

    Ok((output, queue.into_iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryptable::Encryptable;
    use crate::types::U256;
    use crate::utype::FheType;
    use serde_json::json;

    fn in_item(n: u64, utype: FheType) -> CoFheInItem {
        CoFheInItem {
            ct_hash: U256::from(n),
            security_zone: 0,
            utype,
            signature: format!("0x{:02x}", n),
        }
    }

    fn nested_input() -> EncryptInput {
        Shape::sequence([
            Encryptable::uint8(1).into(),
            Shape::plain("untouched"),
            Shape::record([
                ("flag", Encryptable::bool(true).into()),
                ("count", Shape::plain(42)),
                (
                    "deep",
                    Shape::sequence([Encryptable::uint64(3).into(), Encryptable::uint32(4).into()]),
                ),
            ]),
        ])
    }

    #[test]
    fn test_extract_order() {
        let items = encrypt_extract(&nested_input());
        let utypes: Vec<_> = items.iter().map(|i| i.utype).collect();
        assert_eq!(
            utypes,
            vec![FheType::Uint8, FheType::Bool, FheType::Uint64, FheType::Uint32]
        );
        assert_eq!(items[2].data, U256::from(3u64));
    }

    #[test]
    fn test_extract_no_encryptables() {
        let input = Shape::sequence([Shape::plain(1), Shape::plain("x")]);
        assert!(encrypt_extract(&input).is_empty());
    }

    #[test]
    fn test_replace_positions() {
        let input = nested_input();
        let handles = vec![
            in_item(10, FheType::Uint8),
            in_item(11, FheType::Bool),
            in_item(12, FheType::Uint64),
            in_item(13, FheType::Uint32),
        ];

        let (output, remaining) = encrypt_replace(&input, handles).unwrap();
        assert!(remaining.is_empty());

        let seq = output.as_sequence().unwrap();
        assert_eq!(seq[0].as_encrypted().unwrap().ct_hash, U256::from(10u64));
        assert_eq!(seq[1], Shape::Leaf(OutputLeaf::Plain(json!("untouched"))));

        let record = &seq[2];
        assert_eq!(
            record.field("flag").unwrap().as_encrypted().unwrap().ct_hash,
            U256::from(11u64)
        );
        assert_eq!(
            record.field("count").unwrap(),
            &Shape::Leaf(OutputLeaf::Plain(json!(42)))
        );
        let deep = record.field("deep").unwrap().as_sequence().unwrap();
        assert_eq!(deep[1].as_encrypted().unwrap().ct_hash, U256::from(13u64));
    }

    #[test]
    fn test_replace_reports_leftovers() {
        let input: EncryptInput = Encryptable::uint8(1).into();
        let (_, remaining) = encrypt_replace(
            &input,
            vec![in_item(1, FheType::Uint8), in_item(2, FheType::Uint8)],
        )
        .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].ct_hash, U256::from(2u64));
    }

    #[test]
    fn test_replace_too_few_handles() {
        let input: EncryptInput = vec![Encryptable::uint8(1), Encryptable::uint8(2)].into();
        let result = encrypt_replace(&input, vec![in_item(1, FheType::Uint8)]);
        assert_eq!(result.unwrap_err(), CoreError::MissingInItem(1));
    }

    #[test]
    fn test_output_serializes_as_json_shape() {
        let input = Shape::record([("a", Shape::plain(1)), ("b", Encryptable::uint8(5).into())]);
        let (output, _) = encrypt_replace(&input, vec![in_item(9, FheType::Uint8)]).unwrap();
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["a"], 1);
        assert_eq!(json["b"]["ctHash"], "9");
        assert_eq!(json["b"]["utype"], 2);
    }
}
