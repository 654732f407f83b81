// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request documents
//!
//! A document is plain text split into blocks by `###` lines. A block whose
//! delimiter reads `### javascript` holds script source; every other block
//! holds one request:
//!
//! ```text
//! ### javascript
//! this.data.host = "api.example.com";
//! ###
//! # Fetch the current user
//! GET https://{{host}}/me
//! Accept: application/json
//!
//! ={ verbose: true }
//! ```

pub mod extract;
pub mod grammar;
pub mod parser;

pub use extract::extract;
pub use grammar::{split_lines, BlockKind};
pub use parser::{BlockKindName, BlockSummary, DocumentParser, Plan, RawBlock, ScriptBlock, Target};
