//! In-memory filtering over a fetched restaurant list.

use std::collections::HashSet;

use crate::model::Restaurant;

/// Filter value for one restaurant attribute; `all` matches everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
  All,
  Only(String),
}

impl Selection {
  pub fn parse(value: &str) -> Self {
    if value == "all" {
      Self::All
    } else {
      Self::Only(value.to_string())
    }
  }

  pub fn matches(&self, value: &str) -> bool {
    match self {
      Self::All => true,
      Self::Only(wanted) => wanted == value,
    }
  }
}

impl From<Option<&str>> for Selection {
  fn from(value: Option<&str>) -> Self {
    value.map(Self::parse).unwrap_or(Self::All)
  }
}

pub(super) fn by_selection(
  restaurants: Vec<Restaurant>,
  cuisine: &Selection,
  neighborhood: &Selection,
) -> Vec<Restaurant> {
  restaurants
    .into_iter()
    .filter(|r| cuisine.matches(&r.cuisine_type) && neighborhood.matches(&r.neighborhood))
    .collect()
}

/// Distinct values, keeping the first occurrence of each in input order.
pub(super) fn unique_in_order<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
  let mut seen = HashSet::new();
  values
    .into_iter()
    .filter(|v| seen.insert(*v))
    .map(String::from)
    .collect()
}
