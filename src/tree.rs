use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combinations::enumerate;
use crate::profile::DeviceProfile;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("commands template is not a nested map of code strings: {0}")]
    InvalidTemplate(#[source] serde_json::Error),
    #[error("no command slot at {0}")]
    MissingSlot(String),
}

/// One node of the command tree: either a learnt (or still empty) code string
/// or a further axis level. Serializes to the plain nested-object form SmartIR
/// expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Leaf(String),
    Branch(IndexMap<String, Node>),
}

/// The `commands` subtree of a SmartIR document.
///
/// Built once per session with every combination's leaf pre-populated as an
/// empty string, plus the sibling `off` slot. An empty leaf means "not learnt
/// yet"; the session controller treats non-empty leaves as already done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTree {
    root: IndexMap<String, Node>,
}

impl CommandTree {
    /// Starts from the template's `commands` object (keeping `off` and any
    /// other sibling keys) and overwrites each operation mode with the full
    /// empty axis structure for the profile.
    pub fn new(template: &serde_json::Value, profile: &DeviceProfile) -> Result<Self, TreeError> {
        let mut root: IndexMap<String, Node> =
            serde_json::from_value(template.clone()).map_err(TreeError::InvalidTemplate)?;

        let empty = Self::empty_axes(profile);
        for mode in &profile.operation_modes {
            root.insert(mode.clone(), empty.clone());
        }
        Ok(Self { root })
    }

    fn empty_axes(profile: &DeviceProfile) -> Node {
        let temps: IndexMap<String, Node> = profile
            .temperatures()
            .map(|t| (t.to_string(), Node::Leaf(String::new())))
            .collect();
        let mut node = Node::Branch(temps);
        if let Some(swings) = &profile.swing_modes {
            node = Node::Branch(swings.iter().map(|s| (s.clone(), node.clone())).collect());
        }
        if let Some(fans) = &profile.fan_modes {
            node = Node::Branch(fans.iter().map(|f| (f.clone(), node.clone())).collect());
        }
        node
    }

    fn node_at(&self, path: &[String]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.root.get(first)?;
        for key in rest {
            node = match node {
                Node::Branch(children) => children.get(key)?,
                Node::Leaf(_) => return None,
            };
        }
        Some(node)
    }

    pub fn get(&self, path: &[String]) -> Result<&str, TreeError> {
        match self.node_at(path) {
            Some(Node::Leaf(code)) => Ok(code),
            _ => Err(TreeError::MissingSlot(path.join("."))),
        }
    }

    pub fn set(&mut self, path: &[String], code: &str) -> Result<(), TreeError> {
        let missing = || TreeError::MissingSlot(path.join("."));
        let (first, rest) = path.split_first().ok_or_else(missing)?;
        let mut node = self.root.get_mut(first).ok_or_else(missing)?;
        for key in rest {
            node = match node {
                Node::Branch(children) => children.get_mut(key).ok_or_else(missing)?,
                Node::Leaf(_) => return Err(missing()),
            };
        }
        match node {
            Node::Leaf(slot) => {
                *slot = code.to_string();
                Ok(())
            }
            Node::Branch(_) => Err(missing()),
        }
    }

    pub fn set_off(&mut self, code: &str) {
        self.root
            .insert("off".to_string(), Node::Leaf(code.to_string()));
    }

    pub fn off(&self) -> Option<&str> {
        match self.root.get("off") {
            Some(Node::Leaf(code)) => Some(code),
            _ => None,
        }
    }

    /// Overlays a restored checkpoint: each top-level key replaces the freshly
    /// initialized one wholesale.
    pub fn merge(&mut self, snapshot: IndexMap<String, Node>) {
        for (key, node) in snapshot {
            self.root.insert(key, node);
        }
    }

    /// Clone of the tree without the `off` slot, the shape checkpoints use.
    pub fn without_off(&self) -> IndexMap<String, Node> {
        let mut copy = self.root.clone();
        copy.shift_remove("off");
        copy
    }

    pub fn to_value(&self) -> serde_json::Value {
        // maps of strings and nested maps always serialize
        serde_json::to_value(&self.root).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::combinations::Combination;
    use serde_json::json;

    fn profile() -> DeviceProfile {
        DeviceProfile {
            min_temperature: 18,
            max_temperature: 19,
            precision: 1,
            operation_modes: vec!["cool".into(), "heat".into()],
            fan_modes: Some(vec!["low".into(), "high".into()]),
            swing_modes: Some(vec!["up".into(), "down".into()]),
        }
    }

    #[test]
    fn prepopulates_every_combination_leaf() {
        let p = profile();
        let tree = CommandTree::new(&json!({"off": ""}), &p).unwrap();
        for comb in enumerate(&p) {
            assert_eq!(tree.get(&comb.key_path()).unwrap(), "");
        }
        assert_eq!(tree.off(), Some(""));
    }

    #[test]
    fn set_then_get_roundtrip() {
        let p = profile();
        let mut tree = CommandTree::new(&json!({"off": ""}), &p).unwrap();
        let comb = Combination::All {
            operation: "heat".into(),
            fan: "high".into(),
            swing: "down".into(),
            temperature: 19,
        };
        tree.set(&comb.key_path(), "Q09ERQ==").unwrap();
        assert_eq!(tree.get(&comb.key_path()).unwrap(), "Q09ERQ==");
    }

    #[test]
    fn unknown_path_is_an_error() {
        let p = profile();
        let mut tree = CommandTree::new(&json!({"off": ""}), &p).unwrap();
        let path = vec!["dry".to_string(), "18".to_string()];
        assert!(matches!(
            tree.get(&path),
            Err(TreeError::MissingSlot(p)) if p == "dry.18"
        ));
        assert!(tree.set(&path, "x").is_err());
    }

    #[test]
    fn without_off_excludes_only_off() {
        let p = profile();
        let mut tree = CommandTree::new(&json!({"off": ""}), &p).unwrap();
        tree.set_off("T0ZG");
        let subtree = tree.without_off();
        assert!(subtree.get("off").is_none());
        assert!(subtree.get("cool").is_some());
        assert!(subtree.get("heat").is_some());
    }

    #[test]
    fn merge_replaces_restored_modes() {
        let p = profile();
        let mut tree = CommandTree::new(&json!({"off": ""}), &p).unwrap();
        let snapshot: IndexMap<String, Node> = serde_json::from_value(json!({
            "cool": {
                "low": {
                    "up": {"18": "QQ==", "19": "Qg=="},
                    "down": {"18": "", "19": ""}
                },
                "high": {
                    "up": {"18": "", "19": ""},
                    "down": {"18": "", "19": ""}
                }
            }
        }))
        .unwrap();
        tree.merge(snapshot);
        let learnt = vec![
            "cool".to_string(),
            "low".to_string(),
            "up".to_string(),
            "19".to_string(),
        ];
        assert_eq!(tree.get(&learnt).unwrap(), "Qg==");
        let untouched = vec![
            "heat".to_string(),
            "low".to_string(),
            "up".to_string(),
            "18".to_string(),
        ];
        assert_eq!(tree.get(&untouched).unwrap(), "");
    }

    #[test]
    fn nodes_deserialize_untagged() {
        let node: Node = serde_json::from_value(json!({"18": "QQ==", "19": ""})).unwrap();
        match node {
            Node::Branch(children) => {
                assert_eq!(children.get("18"), Some(&Node::Leaf("QQ==".into())));
            }
            Node::Leaf(_) => panic!("expected a branch"),
        }
    }
}
