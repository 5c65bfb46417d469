//! Table-driven test case generation.
//!
//! Starting from a base case, each call to [`Variants::vary`] appends one
//! copy of the base per value with a single field changed. Variations never
//! compound: the result for `vary(a, [1, 2]).vary(b, [x])` is
//! `[base, base{a=1}, base{a=2}, base{b=x}]`.

use std::fmt::{self, Display};

/// Which field of the base case a variant changes.
///
/// The default value describes the base case itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariantInfo {
    /// Name of the varied field.
    pub field: String,
    /// 1-based position of the value within its `vary` call.
    pub index: usize,
    /// Display rendering of the value.
    pub value: String,
}

impl VariantInfo {
    /// Short label suitable for a sub-test name: `"Base"` or `"<field>-<index>"`.
    pub fn label(&self) -> String {
        if self.field.is_empty() {
            "Base".to_string()
        } else {
            format!("{}-{}", self.field, self.index)
        }
    }
}

impl fmt::Display for VariantInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Test case types that record which variant they are.
pub trait HasVariantInfo {
    /// Stores the variant description on the case.
    fn set_variant_info(&mut self, info: VariantInfo);
}

/// Builder for variant lists.
#[derive(Clone, Debug)]
pub struct Variants<T> {
    base: T,
    result: Vec<T>,
}

impl<T: Clone> Variants<T> {
    /// Starts a list containing only `base`.
    pub fn new(base: T) -> Self {
        Self {
            result: vec![base.clone()],
            base,
        }
    }

    /// Appends one variant per value, each applying `set` to a fresh copy of
    /// the base.
    pub fn vary<V, S, I>(mut self, set: S, values: I) -> Self
    where
        S: Fn(&mut T, V),
        I: IntoIterator<Item = V>,
    {
        for value in values {
            let mut case = self.base.clone();
            set(&mut case, value);
            self.result.push(case);
        }
        self
    }

    /// Returns the base followed by all variants.
    pub fn build(self) -> Vec<T> {
        self.result
    }
}

impl<T: Clone + HasVariantInfo> Variants<T> {
    /// Like [`vary`](Self::vary), additionally recording `field`, the
    /// 1-based index and the value on each variant.
    pub fn vary_tagged<V, S, I>(mut self, field: &str, set: S, values: I) -> Self
    where
        V: Display,
        S: Fn(&mut T, V),
        I: IntoIterator<Item = V>,
    {
        for (i, value) in values.into_iter().enumerate() {
            let mut case = self.base.clone();
            let info = VariantInfo {
                field: field.to_string(),
                index: i + 1,
                value: value.to_string(),
            };
            set(&mut case, value);
            case.set_variant_info(info);
            self.result.push(case);
        }
        self
    }
}
