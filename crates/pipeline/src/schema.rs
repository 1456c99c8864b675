//! Registered record layouts.
//!
//! A raw record is a line of whitespace separated tokens. Its layout is
//! identified by the token count alone, so every registered schema must claim
//! a distinct count. The table is validated once, before any scan starts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, SchemaError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

/// Declarative form of a [`RecordSchema`], as found in `config.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub name: String,
    pub family: AddressFamily,
    /// Number of whitespace separated tokens in the record value.
    pub tokens: usize,
    /// Token indices forming the flow identity, in key order.
    pub key: Vec<usize>,
    /// Token indices of the source and destination address.
    pub edge: [usize; 2],
}

impl SchemaConfig {
    #[must_use]
    pub fn ipv4() -> Self {
        Self {
            name: "ipv4".to_owned(),
            family: AddressFamily::Ipv4,
            tokens: 13,
            key: vec![5, 9, 10],
            edge: [9, 10],
        }
    }

    /// The ipv6 dump lists the destination address (token 7) before the
    /// source address (token 8). The flow key keeps the dump order while the
    /// edge is emitted as `src dst`.
    #[must_use]
    pub fn ipv6() -> Self {
        Self {
            name: "ipv6".to_owned(),
            family: AddressFamily::Ipv6,
            tokens: 11,
            key: vec![3, 7, 8],
            edge: [8, 7],
        }
    }

    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![Self::ipv4(), Self::ipv6()]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSchema {
    name: String,
    family: AddressFamily,
    tokens: usize,
    key: Box<[usize]>,
    value: Box<[usize]>,
    edge: [usize; 2],
}

impl RecordSchema {
    pub fn try_from_config(config: &SchemaConfig) -> Result<Self, SchemaError> {
        let name = &config.name;

        if config.tokens == 0 {
            return Err(SchemaError::ZeroTokens { name: name.clone() });
        }

        if config.key.is_empty() {
            return Err(SchemaError::EmptyKey { name: name.clone() });
        }

        let mut in_key = vec![false; config.tokens];

        for &index in config.key.iter().chain(&config.edge) {
            if index >= config.tokens {
                return Err(SchemaError::IndexOutOfRange {
                    name: name.clone(),
                    index,
                    tokens: config.tokens,
                });
            }
        }

        for &index in &config.key {
            if in_key[index] {
                return Err(SchemaError::DuplicateIndex {
                    name: name.clone(),
                    index,
                });
            }
            in_key[index] = true;
        }

        let value = (0..config.tokens).filter(|&index| !in_key[index]).collect();

        Ok(Self {
            name: name.clone(),
            family: config.family,
            tokens: config.tokens,
            key: config.key.clone().into_boxed_slice(),
            value,
            edge: config.edge,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        self.family
    }

    #[must_use]
    pub const fn tokens(&self) -> usize {
        self.tokens
    }

    #[must_use]
    pub fn key_indices(&self) -> &[usize] {
        &self.key
    }

    /// Every index not in the key, ascending.
    #[must_use]
    pub fn value_indices(&self) -> &[usize] {
        &self.value
    }

    /// Joins the key tokens in key order.
    ///
    /// `tokens` must have exactly [`Self::tokens`] entries.
    #[must_use]
    pub fn derived_key(&self, tokens: &[&str]) -> String {
        join(self.key.iter().map(|&index| tokens[index]))
    }

    /// The source key followed by the value tokens.
    #[must_use]
    pub fn fragment(&self, source_key: &str, tokens: &[&str]) -> String {
        join(core::iter::once(source_key).chain(self.value.iter().map(|&index| tokens[index])))
    }

    /// `src dst` address pair of the record.
    #[must_use]
    pub fn edge(&self, tokens: &[&str]) -> String {
        let [src, dst] = self.edge;

        format!("{} {}", tokens[src], tokens[dst])
    }
}

fn join<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();

    for part in parts {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(part);
    }

    out
}

/// Validated schema table, keyed by token count.
#[derive(Clone, Debug)]
pub struct SchemaRegistry {
    by_tokens: BTreeMap<usize, RecordSchema>,
}

impl SchemaRegistry {
    pub fn new(configs: &[SchemaConfig]) -> Result<Self, SchemaError> {
        if configs.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut by_tokens: BTreeMap<usize, RecordSchema> = BTreeMap::new();

        for config in configs {
            let schema = RecordSchema::try_from_config(config)?;

            if let Some(existing) = by_tokens.get(&schema.tokens) {
                return Err(SchemaError::DuplicateShape {
                    tokens: schema.tokens,
                    first: existing.name.clone(),
                    second: schema.name,
                });
            }

            let _ignored = by_tokens.insert(schema.tokens, schema);
        }

        Ok(Self { by_tokens })
    }

    /// Registry holding the built-in `ipv4` and `ipv6` layouts.
    pub fn with_defaults() -> Result<Self, SchemaError> {
        Self::new(&SchemaConfig::defaults())
    }

    pub fn select(&self, tokens: usize) -> Result<&RecordSchema, ParseError> {
        self.by_tokens
            .get(&tokens)
            .ok_or(ParseError::UnsupportedShape { tokens })
    }
}
