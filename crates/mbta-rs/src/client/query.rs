//! Canonical upstream query form.
//!
//! A [`Query`] is a resource path plus normalised parameters. Values are
//! trimmed and empty values are dropped, so `Some("")` and `None` produce the
//! same request and the same [`Fingerprint`].

use crate::api::fingerprint::Fingerprint;
use crate::error::ApiError;
use crate::model::ResourceKind;
use std::collections::BTreeMap;

/// Largest `page[limit]` upstream accepts.
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    kind: ResourceKind,
    path: String,
    params: BTreeMap<String, String>,
}

impl Query {
    /// Query against the collection endpoint of `kind`.
    pub fn collection(kind: ResourceKind) -> Self {
        Self {
            kind,
            path: kind.path().to_string(),
            params: BTreeMap::new(),
        }
    }

    /// Query for one resource by ID.
    pub fn single(kind: ResourceKind, id: &str, field: &str) -> Result<Self, ApiError> {
        let id = required_id(field, id)?;
        Ok(Self {
            kind,
            path: format!("{}/{id}", kind.path()),
            params: BTreeMap::new(),
        })
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Set a raw parameter. Blank values remove it.
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        let value = value.trim();
        if value.is_empty() {
            self.params.remove(key);
        } else {
            self.params.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// `filter[name]=value` when `value` is present.
    pub fn filter<V: ToString>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.param(&format!("filter[{name}]"), v),
            None => self,
        }
    }

    pub fn include(self, relationships: &[&str]) -> Self {
        self.param("include", relationships.join(","))
    }

    /// Sparse fieldset for resources of `kind`.
    pub fn fields(self, kind: ResourceKind, fields: &[&str]) -> Self {
        self.param(&format!("fields[{}]", kind.type_name()), fields.join(","))
    }

    pub fn sort(self, key: &str) -> Self {
        self.param("sort", key)
    }

    /// Set `page[limit]`, rejecting values outside `1..=100`.
    pub fn page_limit(self, limit: u32) -> Result<Self, ApiError> {
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(ApiError::invalid(
                "page_limit",
                format!("must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"),
            ));
        }
        Ok(self.param("page[limit]", limit))
    }

    pub fn page_offset(self, offset: Option<u32>) -> Self {
        match offset {
            Some(0) | None => self,
            Some(o) => self.param("page[offset]", o),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn has_page_limit(&self) -> bool {
        self.params.contains_key("page[limit]")
    }

    /// Parameters in canonical order, ready for the transport.
    pub fn params(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(&self.path, &self.params)
    }
}

/// Trim an ID and reject it when blank or when it would escape the path.
pub fn required_id<'a>(field: &str, id: &'a str) -> Result<&'a str, ApiError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::invalid(field, "must not be empty"));
    }
    if id.contains(['/', '?', '#']) || id.chars().any(char::is_whitespace) {
        return Err(ApiError::invalid(field, format!("'{id}' is not a valid ID")));
    }
    Ok(id)
}
