//! # alzw Library
//!
//! Streaming LZW compression and expansion with two twists on the textbook
//! algorithm:
//! * an escape mechanism that lets the string table start empty and grow
//!   from whatever byte alphabet actually shows up
//! * least-recently-used pruning that rebuilds the table when it fills,
//!   keeping only recently seen strings
//!
//! Every stream is self describing: a short header records the maximum code
//! width, the prune window, and whether escapes are in use, so expansion
//! takes no options. Codes are packed MSB-first at a width that grows one
//! bit at a time under control of in-band codes.
//!
//! The compression/expansion functions are generics that operate on trait
//! objects with bounds `Read` or `Write`. There are convenience functions
//! for working directly with buffers.
//!
//! ## File Example
//!
//! ```rs
//! use alzw::lzw;
//! let mut in_file = std::fs::File::open("some_input_path").expect("open failed");
//! let mut out_file = std::fs::File::create("some_output_path").expect("create failed");
//! let (in_size,out_size) = lzw::compress(&mut in_file,&mut out_file,&lzw::STD_OPTIONS)
//!     .expect("compression failed");
//! eprintln!("compressed {} into {}",in_size,out_size);
//! ```
//!
//! ## Buffer Example
//!
//! ```rs
//! use alzw::lzw;
//! let test_data = "This is the chaunt of the priests.  The chaunt of the priests of Mung.".as_bytes();
//! let compressed = lzw::compress_slice(test_data,&lzw::STD_OPTIONS).expect("compression failed");
//! let expanded = lzw::expand_slice(&compressed).expect("expansion failed");
//! ```

mod tools;
pub mod lzw;

type DYNERR = Box<dyn std::error::Error>;

/// Stream Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("invalid encoded stream")]
    InvalidStream,
    #[error("unexpected end of stream")]
    TruncatedStream,
    #[error("header value out of range")]
    BadHeader
}
