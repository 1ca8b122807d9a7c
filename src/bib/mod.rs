pub mod audit;
pub mod bibtex;
pub mod collect;
pub mod config;
pub mod export;
pub mod gallery;
pub mod latex;
pub mod library;
pub mod paths;
pub mod pdf_meta;
pub mod reconcile;
pub mod rename;
pub mod report;
pub mod select;
pub mod short_code;
pub mod state;
pub mod util;
pub mod warn;
pub mod watcher;
