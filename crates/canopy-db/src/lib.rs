//! Canopy-DB: Database schema, migrations, and query operations
//!
//! This crate provides the reference catalog persistence for canopy using
//! SQLite with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use canopy_db::pool::{init_pool, get_conn};
//! use canopy_db::queries::plants;
//!
//! let pool = init_pool("/var/lib/canopy/catalog.sqlite").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! plants::insert_pending(&conn, &"ficus-lyrata".into(), "Ficus lyrata").unwrap();
//! for plant in plants::list_pending(&conn).unwrap() {
//!     println!("pending: {}", plant.name);
//! }
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
