//! Core traits for the caching system.

/// Trait for entities that can be cached in a collection.
pub trait Cacheable: Clone + Send + Sync + 'static {
  /// Unique identifier for this entity within its collection
  fn cache_key(&self) -> String;

  /// Entity type name used in log output (e.g., "record", "country")
  fn entity_type() -> &'static str;
}

/// A partial update that can be merged onto a cached entity.
pub trait Patch<T>: Send + Sync + 'static {
  fn apply(&self, target: &mut T);
}

/// Logical name of a cached collection.
pub trait QueryKey {
  /// Stable key the entry is stored under
  fn cache_hash(&self) -> String;

  /// Human-readable description for log output
  fn description(&self) -> String {
    self.cache_hash()
  }
}

impl QueryKey for str {
  fn cache_hash(&self) -> String {
    self.to_string()
  }
}

/// Merge `patch` onto the item whose key is `id`, leaving the rest untouched.
pub fn merge_patch<T: Cacheable, P: Patch<T>>(items: &[T], id: &str, patch: &P) -> Vec<T> {
  items
    .iter()
    .map(|item| {
      let mut item = item.clone();
      if item.cache_key() == id {
        patch.apply(&mut item);
      }
      item
    })
    .collect()
}

/// Put `replacement` in place of the item with the same key.
pub fn replace_item<T: Cacheable>(items: &[T], replacement: &T) -> Vec<T> {
  let key = replacement.cache_key();
  items
    .iter()
    .map(|item| {
      if item.cache_key() == key {
        replacement.clone()
      } else {
        item.clone()
      }
    })
    .collect()
}

#[cfg(test)]
pub(crate) mod testing {
  use super::*;

  #[derive(Debug, Clone, PartialEq, Eq)]
  pub struct Item {
    pub id: String,
    pub name: String,
  }

  pub fn item(id: &str, name: &str) -> Item {
    Item {
      id: id.to_string(),
      name: name.to_string(),
    }
  }

  impl Cacheable for Item {
    fn cache_key(&self) -> String {
      self.id.clone()
    }

    fn entity_type() -> &'static str {
      "item"
    }
  }

  #[derive(Debug, Clone)]
  pub struct Rename(pub &'static str);

  impl Patch<Item> for Rename {
    fn apply(&self, target: &mut Item) {
      target.name = self.0.to_string();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::testing::*;
  use super::*;

  #[test]
  fn test_merge_patch_touches_only_matching_id() {
    let items = vec![item("1", "Acme"), item("2", "Globex")];
    let merged = merge_patch(&items, "1", &Rename("Acme Corp"));
    assert_eq!(merged, vec![item("1", "Acme Corp"), item("2", "Globex")]);
    // source untouched
    assert_eq!(items[0].name, "Acme");
  }

  #[test]
  fn test_merge_patch_unknown_id_is_noop() {
    let items = vec![item("1", "Acme")];
    assert_eq!(merge_patch(&items, "9", &Rename("x")), items);
  }

  #[test]
  fn test_replace_item() {
    let items = vec![item("1", "Acme"), item("2", "Globex")];
    let replaced = replace_item(&items, &item("2", "Initech"));
    assert_eq!(replaced, vec![item("1", "Acme"), item("2", "Initech")]);
  }
}
