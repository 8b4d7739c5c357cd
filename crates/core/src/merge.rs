//! Merge engine: combines the raw top-level constructs of one directory
//! scope into merged blocks under a per-block-type policy table.

use crate::ast::{Attribute, Attributes, Block, Body, LabelBlockType, Range};
use crate::error::{Error, ErrorList};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

/// How occurrences of one block type are combined within a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Same-identity occurrences fuse into one [`MergedBlock`].
    MergeByLabel,
    /// One occurrence per identity; a second one is a redeclaration.
    UniqueByLabel,
    /// Every occurrence is kept, in order.
    Append,
    /// A later occurrence with the same identity replaces the earlier one.
    Override,
}

// ──────────────────────────────────────────────
// Merged blocks
// ──────────────────────────────────────────────

/// One physical block that contributed to a [`MergedBlock`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawOrigin(pub Arc<Block>);

impl RawOrigin {
    pub fn block(&self) -> &Block {
        &self.0
    }

    pub fn range(&self) -> &Range {
        &self.0.range
    }
}

impl Serialize for RawOrigin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.range.serialize(serializer)
    }
}

/// The logical entity for one [`LabelBlockType`] within a scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedBlock {
    pub block_type: String,
    pub labels: Vec<String>,
    pub attributes: Attributes,
    pub origins: Vec<RawOrigin>,
    #[serde(rename = "blocks", serialize_with = "serialize_children")]
    pub children: IndexMap<LabelBlockType, MergedBlock>,
}

fn serialize_children<S: Serializer>(
    children: &IndexMap<LabelBlockType, MergedBlock>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(children.values())
}

impl MergedBlock {
    pub fn new(identity: &LabelBlockType) -> Self {
        MergedBlock {
            block_type: identity.block_type.clone(),
            labels: identity.labels.clone(),
            attributes: Attributes::new(),
            origins: Vec::new(),
            children: IndexMap::new(),
        }
    }

    pub fn identity(&self) -> LabelBlockType {
        LabelBlockType::new(&self.block_type, &self.labels)
    }

    /// Fold one more physical occurrence into this entity.
    ///
    /// Attributes are first-wins: a name that is already present is a
    /// redeclaration reported at the new attribute. Child blocks merge by
    /// their own identity, recursively. Every conflict is collected.
    pub fn merge_block(&mut self, raw: &Arc<Block>) -> Result<(), ErrorList> {
        debug_assert_eq!(raw.identity(), self.identity());
        let mut errors = ErrorList::new();
        let identity = self.identity();
        self.origins.push(RawOrigin(raw.clone()));
        for attr in raw.attributes.values() {
            errors.append(insert_attribute(&mut self.attributes, attr, &identity));
        }
        for child in &raw.blocks {
            let identity = child.identity();
            let merged = self
                .children
                .entry(identity)
                .or_insert_with_key(MergedBlock::new);
            errors.append(merged.merge_block(child));
        }
        errors.into_result()
    }

    /// Header range of the first contributing occurrence.
    pub fn def_range(&self) -> Option<Range> {
        self.origins.first().map(|o| o.block().def_range())
    }

    /// Children of the given type, in first-seen order.
    pub fn children_of<'a>(
        &'a self,
        block_type: &'a str,
    ) -> impl Iterator<Item = &'a MergedBlock> + 'a {
        self.children
            .values()
            .filter(move |c| c.block_type == block_type)
    }

    /// Raw occurrences of every child block, in merge order.
    pub fn raw_children(&self) -> impl Iterator<Item = &Arc<Block>> {
        self.origins.iter().flat_map(|o| o.0.blocks.iter())
    }
}

fn insert_attribute(
    attributes: &mut Attributes,
    attr: &Attribute,
    owner: &LabelBlockType,
) -> Result<(), ErrorList> {
    if let Some(first) = attributes.get(&attr.name) {
        return Err(Error::redeclared(
            &attr.name_range,
            format!(
                "attribute {:?} of {} redeclared (first defined at {})",
                attr.name, owner, first.name_range
            ),
        )
        .into());
    }
    attributes.insert(attr.name.clone(), attr.clone());
    Ok(())
}

// ──────────────────────────────────────────────
// Raw configuration of one scope
// ──────────────────────────────────────────────

/// Accumulated top-level attributes and blocks of one scope.
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub attributes: Attributes,
    pub merged: IndexMap<LabelBlockType, MergedBlock>,
    pub unmerged: Vec<Arc<Block>>,
    seen: HashMap<LabelBlockType, usize>,
    policies: HashMap<String, MergePolicy>,
}

impl RawConfig {
    pub fn new<I, S>(policies: I) -> Self
    where
        I: IntoIterator<Item = (S, MergePolicy)>,
        S: Into<String>,
    {
        RawConfig {
            policies: policies.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..RawConfig::default()
        }
    }

    pub fn policy(&self, block_type: &str) -> Option<MergePolicy> {
        self.policies.get(block_type).copied()
    }

    /// Merge one file's top-level attributes and blocks.
    pub fn merge_body(&mut self, body: &Body) -> Result<(), ErrorList> {
        let mut errors = ErrorList::new();
        errors.append(self.merge_attributes(&body.attributes));
        errors.append(self.merge_blocks(&body.blocks));
        errors.into_result()
    }

    pub fn merge_attributes(&mut self, attributes: &Attributes) -> Result<(), ErrorList> {
        let mut errors = ErrorList::new();
        for attr in attributes.values() {
            if let Some(first) = self.attributes.get(&attr.name) {
                errors.push(Error::redeclared(
                    &attr.name_range,
                    format!(
                        "attribute {:?} redeclared (first defined at {})",
                        attr.name, first.name_range
                    ),
                ));
                continue;
            }
            self.attributes.insert(attr.name.clone(), attr.clone());
        }
        errors.into_result()
    }

    pub fn merge_blocks(&mut self, blocks: &[Arc<Block>]) -> Result<(), ErrorList> {
        let mut errors = ErrorList::new();
        for block in blocks {
            errors.append(self.merge_block(block));
        }
        errors.into_result()
    }

    pub fn merge_block(&mut self, block: &Arc<Block>) -> Result<(), ErrorList> {
        let Some(policy) = self.policy(&block.block_type) else {
            return Err(Error::schema(
                &block.def_range(),
                format!("unrecognized block {:?}", block.block_type),
            )
            .into());
        };
        let identity = block.identity();
        match policy {
            MergePolicy::MergeByLabel => self
                .merged
                .entry(identity)
                .or_insert_with_key(MergedBlock::new)
                .merge_block(block),
            MergePolicy::Append => {
                self.unmerged.push(block.clone());
                Ok(())
            }
            MergePolicy::UniqueByLabel => {
                if let Some(&index) = self.seen.get(&identity) {
                    let first = &self.unmerged[index];
                    return Err(Error::redeclared(
                        &block.def_range(),
                        format!(
                            "{} redeclared (first declared at {})",
                            identity,
                            first.def_range()
                        ),
                    )
                    .into());
                }
                self.seen.insert(identity, self.unmerged.len());
                self.unmerged.push(block.clone());
                Ok(())
            }
            MergePolicy::Override => {
                match self.seen.get(&identity) {
                    Some(&index) => self.unmerged[index] = block.clone(),
                    None => {
                        self.seen.insert(identity, self.unmerged.len());
                        self.unmerged.push(block.clone());
                    }
                }
                Ok(())
            }
        }
    }

    pub fn merged_of<'a>(&'a self, block_type: &'a str) -> impl Iterator<Item = &'a MergedBlock> {
        self.merged
            .values()
            .filter(move |m| m.block_type == block_type)
    }

    pub fn unmerged_of<'a>(&'a self, block_type: &'a str) -> impl Iterator<Item = &'a Arc<Block>> {
        self.unmerged
            .iter()
            .filter(move |b| b.block_type == block_type)
    }
}
