//! Read-only access to stored blog records.
//!
//! A store is a JSON document with one array per collection:
//!
//! ```json
//! {
//!   "posts": [{ "id": 1, "title": "Hello", "slug": "hello", "status": "published", "content": "<p>..</p>" }],
//!   "categories": [],
//!   "comments": []
//! }
//! ```
//!
//! Content is kept exactly as the editor produced it. Sanitization happens at
//! render time, so a policy change applies to every post already stored.
use std::{
  fmt,
  fs,
  path::{Path, PathBuf},
  sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Slugs double as output file names, so only this shape is accepted.
static SLUG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[a-z0-9-]+$").unwrap_or_else(|e| {
    log::error!("Failed to compile SLUG_PATTERN regex: {e}");
    scribe_html::utils::never_matching_regex()
  })
});

const MAX_SLUG_LEN: usize = 60;

/// The named collections of the blog schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
  Posts,
  Categories,
  Comments,
  ContactSubmissions,
  Profiles,
}

impl Collection {
  pub const ALL: [Self; 5] = [
    Self::Posts,
    Self::Categories,
    Self::Comments,
    Self::ContactSubmissions,
    Self::Profiles,
  ];

  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Posts => "posts",
      Self::Categories => "categories",
      Self::Comments => "comments",
      Self::ContactSubmissions => "contact_submissions",
      Self::Profiles => "profiles",
    }
  }
}

impl fmt::Display for Collection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
  Published,
  #[default]
  #[serde(other)]
  Draft,
}

/// A stored blog post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
  pub id:               Option<u64>,
  pub title:            String,
  pub slug:             String,
  pub status:           PostStatus,
  /// Raw editor HTML.
  pub content:          String,
  pub excerpt:          Option<String>,
  pub tags:             Vec<String>,
  pub category_id:      Option<u64>,
  pub image_url:        Option<String>,
  pub image_alt:        Option<String>,
  pub meta_title:       Option<String>,
  pub meta_description: Option<String>,
  pub created_at:       Option<String>,
  pub updated_at:       Option<String>,
}

impl Post {
  #[must_use]
  pub fn is_published(&self) -> bool {
    self.status == PostStatus::Published
  }

  /// Title for the page `<title>`, preferring the SEO title.
  #[must_use]
  pub fn page_title(&self) -> &str {
    self
      .meta_title
      .as_deref()
      .map(str::trim)
      .filter(|title| !title.is_empty())
      .unwrap_or(&self.title)
  }
}

/// Check that a slug is lowercase letters, digits and hyphens, at most 60
/// characters long.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
  slug.len() <= MAX_SLUG_LEN && SLUG_PATTERN.is_match(slug)
}

/// Read access to the record collections.
pub trait RecordStore {
  /// All records of `collection`, in stored order. A missing collection is
  /// empty.
  ///
  /// # Errors
  ///
  /// Returns an error if the collection exists but is not an array.
  fn records(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;

  /// All records of `collection` decoded as `T`.
  ///
  /// # Errors
  ///
  /// Returns an error if any record does not decode.
  fn typed<T: DeserializeOwned>(
    &self,
    collection: Collection,
  ) -> Result<Vec<T>, StoreError> {
    self
      .records(collection)?
      .into_iter()
      .map(|record| {
        serde_json::from_value(record).map_err(|source| {
          StoreError::InvalidRecord {
            collection: collection.as_str(),
            source,
          }
        })
      })
      .collect()
  }

  /// # Errors
  ///
  /// Returns an error if the posts collection cannot be decoded.
  fn posts(&self) -> Result<Vec<Post>, StoreError> {
    self.typed(Collection::Posts)
  }

  /// # Errors
  ///
  /// Returns an error if the posts collection cannot be decoded.
  fn post_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError> {
    Ok(self.posts()?.into_iter().find(|post| post.slug == slug))
  }
}

/// A store backed by a single JSON file, loaded eagerly.
#[derive(Debug, Clone, Default)]
pub struct JsonStore {
  path:        Option<PathBuf>,
  collections: Map<String, Value>,
}

impl JsonStore {
  /// Load a store from `path`.
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be read or is not a JSON object.
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| {
      StoreError::Io {
        path: path.to_path_buf(),
        source,
      }
    })?;
    let collections =
      serde_json::from_str(&content).map_err(|source| {
        StoreError::Parse {
          path: path.to_path_buf(),
          source,
        }
      })?;

    log::debug!("Loaded record store from {}", path.display());
    Ok(Self {
      path: Some(path.to_path_buf()),
      collections,
    })
  }

  /// Build a store from an in-memory JSON object.
  #[must_use]
  pub const fn from_map(collections: Map<String, Value>) -> Self {
    Self {
      path: None,
      collections,
    }
  }

  #[must_use]
  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }
}

impl RecordStore for JsonStore {
  fn records(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
    match self.collections.get(collection.as_str()) {
      None | Some(Value::Null) => Ok(Vec::new()),
      Some(Value::Array(records)) => Ok(records.clone()),
      Some(_) => Err(StoreError::NotACollection(collection.as_str())),
    }
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::expect_used, reason = "Fine in tests")]

  use serde_json::json;

  use super::*;

  fn store(value: Value) -> JsonStore {
    match value {
      Value::Object(map) => JsonStore::from_map(map),
      _ => JsonStore::default(),
    }
  }

  #[test]
  fn test_posts_decode_with_defaults() {
    let store = store(json!({
      "posts": [
        { "id": 1, "title": "Hello", "slug": "hello", "status": "published", "content": "<p>x</p>" },
        { "id": 2, "title": "Wip", "slug": "wip", "status": "scheduled" },
        { "title": "Bare" }
      ]
    }));

    let posts = store.posts().expect("posts decode");
    assert_eq!(posts.len(), 3);
    assert!(posts[0].is_published());
    assert_eq!(posts[1].status, PostStatus::Draft);
    assert_eq!(posts[2].slug, "");
    assert_eq!(posts[2].id, None);
  }

  #[test]
  fn test_missing_and_malformed_collections() {
    let store = store(json!({ "categories": {}, "comments": null }));

    assert!(store.records(Collection::Posts).expect("empty").is_empty());
    assert!(store.records(Collection::Comments).expect("empty").is_empty());
    assert!(matches!(
      store.records(Collection::Categories),
      Err(StoreError::NotACollection("categories"))
    ));
  }

  #[test]
  fn test_invalid_record_names_the_collection() {
    let store = store(json!({ "posts": [{ "title": 5 }] }));
    let err = store.posts().expect_err("title must be a string");
    assert!(err.to_string().contains("'posts'"));
  }

  #[test]
  fn test_post_by_slug() {
    let store = store(json!({
      "posts": [{ "slug": "a", "title": "A" }, { "slug": "b", "title": "B" }]
    }));
    let post = store.post_by_slug("b").expect("decodes").expect("found");
    assert_eq!(post.title, "B");
    assert_eq!(store.post_by_slug("c").expect("decodes"), None);
  }

  #[test]
  fn test_slug_validation() {
    assert!(is_valid_slug("hello-world-2"));
    assert!(!is_valid_slug(""));
    assert!(!is_valid_slug("../etc/passwd"));
    assert!(!is_valid_slug("Hello"));
    assert!(!is_valid_slug(&"a".repeat(61)));
  }

  #[test]
  fn test_page_title_prefers_meta_title() {
    let mut post = Post {
      title: "Title".to_string(),
      ..Default::default()
    };
    assert_eq!(post.page_title(), "Title");
    post.meta_title = Some("  ".to_string());
    assert_eq!(post.page_title(), "Title");
    post.meta_title = Some("SEO".to_string());
    assert_eq!(post.page_title(), "SEO");
  }

  #[test]
  fn test_collection_names() {
    let names: Vec<_> = Collection::ALL.iter().map(ToString::to_string).collect();
    assert_eq!(names, [
      "posts",
      "categories",
      "comments",
      "contact_submissions",
      "profiles"
    ]);
  }
}
