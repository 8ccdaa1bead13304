//! Synthetic e-book content.
//!
//! Fifteen block slots repeat for every chapter; block `i` takes slot
//! `i % 15`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of blocks per chapter.
pub const CHAPTER_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
  pub id: String,
  #[serde(flatten)]
  pub content: BlockContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BlockContent {
  Heading1 {
    content: String,
  },
  Heading2 {
    content: String,
  },
  Heading3 {
    content: String,
  },
  Paragraph {
    content: String,
  },
  Image {
    /// Image URL
    content: String,
    alt: String,
    caption: String,
  },
  Code {
    language: String,
    content: String,
  },
  Quote {
    content: String,
    author: String,
  },
  List {
    items: Vec<String>,
  },
  NumberedList {
    items: Vec<String>,
  },
  Divider,
  Button {
    content: String,
    action: ButtonAction,
    payload: ButtonPayload,
  },
  Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ButtonAction {
  OpenModal,
  CustomLogic,
  RedirectExternal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonPayload {
  pub block_id: String,
  /// Milliseconds since the epoch
  pub timestamp: i64,
  pub meta: ButtonMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonMeta {
  pub chapter: usize,
}

const PARAGRAPHS: &[&str] = &[
  "A storefront that keeps working offline treats the network as an optimisation. Everything the shopper needs to keep browsing is already on the device, and the network only makes it fresher.",
  "Hydration is the moment a freshly started application picks up where the last session left off. Until it finishes, nothing the application does should be written back over the saved state.",
  "Caches trade freshness for availability. Choosing a strategy per resource type lets pages stay current while images and fonts load instantly from local storage.",
  "Derived values such as totals and counts are recomputed only when their inputs change. Memoisation keeps large lists cheap to read even when the rest of the state churns.",
  "Long documents are rendered as a sequence of small blocks. Each block carries just enough structure for the reader to lay it out without knowing anything about the others.",
];

const CODE_SNIPPETS: &[&str] = &[
  "fn fibonacci(n: u64) -> u64 {\n  match n {\n    0 | 1 => n,\n    _ => fibonacci(n - 1) + fibonacci(n - 2),\n  }\n}",
  "async fn fetch_json(url: &str) -> reqwest::Result<serde_json::Value> {\n  reqwest::get(url).await?.json().await\n}",
  "<!DOCTYPE html>\n<html lang=\"en\">\n  <head><title>Offline</title></head>\n  <body><h1>You are offline</h1></body>\n</html>",
  "struct Node {\n  value: i32,\n  left: Option<Box<Node>>,\n  right: Option<Box<Node>>,\n}",
];

const QUOTES: &[(&str, &str)] = &[
  ("The best way to predict the future is to invent it.", "Alan Kay"),
  ("Simplicity is prerequisite for reliability.", "Edsger W. Dijkstra"),
  ("Premature optimization is the root of all evil.", "Donald Knuth"),
  ("Make it work, make it right, make it fast.", "Kent Beck"),
];

const LISTS: &[&[&str]] = &[
  &[
    "Products are generated deterministically by index",
    "The cart survives restarts",
    "Saved state is restored before the first write",
  ],
  &[
    "Documents go to the network first",
    "Images and fonts are served from cache first",
    "Scripts and styles are revalidated in the background",
    "Old partitions are removed on activation",
  ],
  &[
    "Honey never spoils",
    "Octopuses have three hearts",
    "Bananas are berries but strawberries are not",
    "A day on Venus is longer than its year",
    "Sharks are older than trees",
  ],
  &[
    "Unit tests cover one component",
    "Integration tests cover the seams between components",
    "Automated tests catch regressions early",
  ],
];

const TABLE_HEADERS: [&str; 4] = ["Feature", "Before", "After", "Improvement"];

const TABLE_ROWS: [[&str; 4]; 4] = [
  ["Render Time", "850ms", "45ms", "94.7%"],
  ["Memory Usage", "245MB", "82MB", "66.5%"],
  ["FPS", "12fps", "60fps", "400%"],
  ["Bundle Size", "2.4MB", "890KB", "62.9%"],
];

/// Generate `count` blocks, stamping button payloads with the current time.
pub fn generate_blocks(count: usize) -> Vec<Block> {
  generate_blocks_at(count, Utc::now())
}

pub fn generate_blocks_at(count: usize, now: DateTime<Utc>) -> Vec<Block> {
  let timestamp = now.timestamp_millis();
  (0..count).map(|i| block(i, timestamp)).collect()
}

fn block(i: usize, timestamp: i64) -> Block {
  let chapter = i / CHAPTER_LEN + 1;
  let slot = i % CHAPTER_LEN;

  let content = match slot {
    0 => BlockContent::Heading1 {
      content: format!("Chapter {}: Advanced React", chapter),
    },
    1 => BlockContent::Heading2 {
      content: format!("Section {}: UI Library", i),
    },
    2..=4 => BlockContent::Paragraph {
      content: PARAGRAPHS[i % PARAGRAPHS.len()].to_string(),
    },
    5 => BlockContent::Image {
      content: format!("https://picsum.photos/seed/{}/800/400", i),
      alt: format!("Illustration {} of the storefront architecture", i),
      caption: format!("Figure {}.{}: Component overview", chapter, slot),
    },
    6 => BlockContent::Code {
      language: "rust".to_string(),
      content: CODE_SNIPPETS[i % CODE_SNIPPETS.len()].to_string(),
    },
    7 => {
      let (text, author) = QUOTES[i % QUOTES.len()];
      BlockContent::Quote {
        content: text.to_string(),
        author: author.to_string(),
      }
    }
    8 => BlockContent::List {
      items: list_items(i),
    },
    9 => BlockContent::NumberedList {
      items: list_items(i),
    },
    10 => BlockContent::Divider,
    11 => BlockContent::Button {
      content: format!("Action Button {}", i),
      action: match i % 3 {
        0 => ButtonAction::OpenModal,
        1 => ButtonAction::CustomLogic,
        _ => ButtonAction::RedirectExternal,
      },
      payload: ButtonPayload {
        block_id: format!("block-{}", i),
        timestamp,
        meta: ButtonMeta { chapter },
      },
    },
    12 => BlockContent::Table {
      headers: TABLE_HEADERS.iter().map(|h| h.to_string()).collect(),
      rows: TABLE_ROWS
        .iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect(),
    },
    13 => BlockContent::Heading3 {
      content: format!("Subsection {}: Implementation Details", i),
    },
    _ => BlockContent::Paragraph {
      content: format!(
        "Block {} closes the chapter. Everything above it was generated from its index alone, so the same document comes back on every run.",
        i
      ),
    },
  };

  Block {
    id: format!("block-{}", i),
    content,
  }
}

fn list_items(i: usize) -> Vec<String> {
  LISTS[i % LISTS.len()].iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn type_tag(block: &Block) -> String {
    serde_json::to_value(block).unwrap()["type"]
      .as_str()
      .unwrap()
      .to_string()
  }

  #[test]
  fn test_layout_follows_index() {
    let blocks = generate_blocks(30);
    assert_eq!(blocks.len(), 30);

    let tags: Vec<String> = blocks[..15].iter().map(type_tag).collect();
    assert_eq!(
      tags,
      vec![
        "heading1",
        "heading2",
        "paragraph",
        "paragraph",
        "paragraph",
        "image",
        "code",
        "quote",
        "list",
        "numbered-list",
        "divider",
        "button",
        "table",
        "heading3",
        "paragraph",
      ]
    );

    // Second chapter repeats the layout
    assert_eq!(type_tag(&blocks[15]), "heading1");
    assert_eq!(
      blocks[15].content,
      BlockContent::Heading1 {
        content: "Chapter 2: Advanced React".to_string()
      }
    );
    assert!(blocks.iter().enumerate().all(|(i, b)| b.id == format!("block-{}", i)));
  }

  #[test]
  fn test_button_action_and_payload() {
    let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
    let blocks = generate_blocks_at(60, now);

    let actions: Vec<ButtonAction> = [11, 26, 41, 56]
      .iter()
      .map(|&i| match &blocks[i].content {
        BlockContent::Button { action, .. } => *action,
        other => panic!("expected button, got {:?}", other),
      })
      .collect();
    // Button slots sit at 11 + 15k, which is always 2 mod 3
    assert_eq!(actions, vec![ButtonAction::RedirectExternal; 4]);

    let value = serde_json::to_value(&blocks[56]).unwrap();
    assert_eq!(
      value,
      json!({
        "id": "block-56",
        "type": "button",
        "content": "Action Button 56",
        "action": "redirectExternal",
        "payload": {
          "blockId": "block-56",
          "timestamp": 1_700_000_000_000i64,
          "meta": { "chapter": 4 }
        }
      })
    );
  }

  #[test]
  fn test_image_and_divider_shape() {
    let blocks = generate_blocks(15);
    let image = serde_json::to_value(&blocks[5]).unwrap();
    assert_eq!(image["content"], "https://picsum.photos/seed/5/800/400");
    assert_eq!(image["caption"], "Figure 1.5: Component overview");

    let divider = serde_json::to_value(&blocks[10]).unwrap();
    assert_eq!(divider, json!({ "id": "block-10", "type": "divider" }));
  }

  #[test]
  fn test_blocks_deserialize_back() {
    let blocks = generate_blocks(15);
    let json = serde_json::to_string(&blocks).unwrap();
    let parsed: Vec<Block> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, blocks);
  }

  #[test]
  fn test_zero_count() {
    assert!(generate_blocks(0).is_empty());
  }
}
