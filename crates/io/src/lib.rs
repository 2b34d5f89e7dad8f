// File I/O: CSV import, result exports, input fingerprints

pub mod csv;
pub mod export;
pub mod fingerprint;
