mod accept;

pub use accept::accept_ndjson;
