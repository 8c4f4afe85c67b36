//! Category grouping and list filtering helpers.
//!
//! Categories are case-insensitive for grouping; stored values are never
//! rewritten. Labels are display-cased (first letter upcased) and an `All`
//! bucket with the total count always comes first.

use std::collections::BTreeMap;

use super::types::Item;

/// Pseudo-category matching every item.
pub const ALL_CATEGORY: &str = "All";

/// A display label with the number of items it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
  pub label: String,
  pub count: usize,
}

/// Group items by lowercased category and count each group.
pub fn category_rollup(items: &[Item]) -> Vec<CategoryCount> {
  let mut counts: BTreeMap<String, usize> = BTreeMap::new();
  for item in items {
    *counts.entry(item.category.to_lowercase()).or_default() += 1;
  }

  let mut rollup = vec![CategoryCount {
    label: ALL_CATEGORY.to_string(),
    count: items.len(),
  }];
  rollup.extend(counts.into_iter().map(|(category, count)| CategoryCount {
    label: display_case(&category),
    count,
  }));

  rollup
}

/// Filter by category (case-insensitive, `All` matches everything) and by a
/// case-insensitive substring of the item name.
pub fn filter_items<'a>(
  items: &'a [Item],
  category: Option<&str>,
  search: Option<&str>,
) -> Vec<&'a Item> {
  let category = category.filter(|c| !c.eq_ignore_ascii_case(ALL_CATEGORY));
  let search = search.map(str::to_lowercase);

  items
    .iter()
    .filter(|item| {
      category
        .map(|c| item.category.eq_ignore_ascii_case(c))
        .unwrap_or(true)
    })
    .filter(|item| {
      search
        .as_deref()
        .map(|s| item.name.to_lowercase().contains(s))
        .unwrap_or(true)
    })
    .collect()
}

fn display_case(category: &str) -> String {
  let mut chars = category.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}
