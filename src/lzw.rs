//! LZW Compression with an adaptive alphabet and table pruning
//!
//! This is classic LZW with variable width codes plus two extensions that
//! travel in-band with the data codes. With escapes enabled the string
//! table starts empty and a byte's first occurrence is announced by an
//! escape control followed by the raw byte, so the alphabet is learned
//! rather than preloaded. With a nonzero prune window the table is rebuilt
//! whenever it fills, keeping only strings observed within the last
//! `window` code observations, so long streams keep adapting instead of
//! freezing.
//!
//! Each stream opens with a 30 bit header (5 bits of maximum code width,
//! 24 bits of prune window, 1 escape flag) and is otherwise a sequence of
//! MSB-first codes whose width starts at 2 bits (escapes) or 9 bits
//! (preloaded alphabet) and changes only under control of the grow and
//! prune codes. The decoder needs no options; everything it must know is
//! in the header.

use std::io::{Cursor,Read,Write,BufReader,BufWriter,ErrorKind};
use crate::DYNERR;
use crate::tools::bit_io::{BitReader,BitWriter};
use crate::tools::dictionary::*;
use crate::tools::recency::Recency;

/// width of the maximum-code-width field in the stream header
const HEADER_MAX_BITS: usize = 5;
/// width of the prune window field in the stream header
const HEADER_WINDOW: usize = 24;
/// width of the escape flag in the stream header
const HEADER_ESCAPE: usize = 1;

/// Options controlling compression. All three values are recorded in the
/// stream header, so expansion takes no options.
#[derive(Clone)]
pub struct Options {
    /// maximum code width in bits, the table holds 1 << max_bits codes
    pub max_bits: usize,
    /// prune window in code observations, 0 disables pruning, must fit in 24 bits
    pub window: u64,
    /// start with an empty table and escape each byte's first occurrence
    pub escape: bool
}

pub const STD_OPTIONS: Options = Options {
    max_bits: 12,
    window: 0,
    escape: false
};

/// smallest width that can represent every code in a table topping out at
/// `highest_code`
fn width_for(highest_code: usize) -> usize {
    let mut nbits = 2;
    while (1 << nbits) - 1 < highest_code {
        nbits += 1;
    }
    nbits
}

/// Structure to perform LZW compression.
struct Encoder {
    table: Dictionary,
    recency: Recency,
    /// code of the longest match accumulated so far
    prefix: Prefix,
    /// current width of each code on the wire
    nbits: usize,
    window: u64,
    out: BitWriter
}

impl Encoder {
    fn new(opt: &Options) -> Self {
        Self {
            table: Dictionary::new(opt.max_bits,opt.escape),
            recency: Recency::new(1 << opt.max_bits),
            prefix: Prefix::Empty,
            // an empty table needs only the control codes, a preloaded one
            // starts beyond the 256 single byte strings
            nbits: if opt.escape { 2 } else { 9 },
            window: opt.window,
            out: BitWriter::new()
        }
    }
    fn put_header<W: Write>(&mut self,opt: &Options,w: &mut BufWriter<W>) -> Result<(),std::io::Error> {
        self.out.put_code(HEADER_MAX_BITS,opt.max_bits,w)?;
        self.out.put_code(HEADER_WINDOW,opt.window as usize,w)?;
        self.out.put_code(HEADER_ESCAPE,opt.escape as usize,w)
    }
    /// emit the escape control followed by the raw byte, and give the byte
    /// a code of its own
    fn escape_byte<W: Write>(&mut self,k: u8,w: &mut BufWriter<W>) -> Result<(),std::io::Error> {
        log::trace!("escape byte {}",k);
        self.out.put_code(self.nbits,ESCAPE_CODE,w)?;
        self.out.put_code(8,k as usize,w)?;
        let (code,_) = self.table.add(Prefix::Empty,k);
        self.recency.observe(code);
        self.check_grow(w)
    }
    /// the grow control is the last code sent at the old width, the
    /// decoder reads it at that width and then switches
    fn check_grow<W: Write>(&mut self,w: &mut BufWriter<W>) -> Result<(),std::io::Error> {
        if self.table.highest_code() > (1 << self.nbits) - 1 {
            log::debug!("grow code width to {} bits",self.nbits + 1);
            self.out.put_code(self.nbits,GROW_CODE,w)?;
            self.nbits += 1;
        }
        Ok(())
    }
    /// once the table fills, announce a prune and rebuild
    fn check_prune<W: Write>(&mut self,w: &mut BufWriter<W>) -> Result<(),std::io::Error> {
        if self.window > 0 && self.table.is_full() {
            log::debug!("table full at counter {}, pruning",self.recency.counter());
            self.out.put_code(self.nbits,PRUNE_CODE,w)?;
            self.table = self.table.prune(&mut self.recency,self.window,&mut self.prefix);
            self.prefix = Prefix::Empty;
            self.nbits = width_for(self.table.highest_code());
        }
        Ok(())
    }
    /// consume one input byte, extending the match or emitting its code
    fn step<W: Write>(&mut self,k: u8,w: &mut BufWriter<W>) -> Result<(),std::io::Error> {
        if let Some(e) = self.table.find_by_pair(self.prefix,k) {
            self.prefix = Prefix::Code(e.code);
            return Ok(());
        }
        match self.prefix {
            Prefix::Empty => {
                // the byte has no code at all yet
                self.escape_byte(k,w)?;
                self.check_prune(w)
            },
            Prefix::Code(c) => {
                log::trace!("code: {}",c);
                self.out.put_code(self.nbits,c,w)?;
                self.recency.observe(c);
                self.table.add(Prefix::Code(c),k);
                self.check_prune(w)?;
                self.check_grow(w)?;
                // start the next match with k, which the prune may have dropped
                match self.table.find_by_pair(Prefix::Empty,k) {
                    Some(e) => {
                        self.prefix = Prefix::Code(e.code);
                        Ok(())
                    },
                    None => {
                        self.escape_byte(k,w)?;
                        self.prefix = Prefix::Empty;
                        self.check_prune(w)
                    }
                }
            }
        }
    }
    /// emit any pending match, then the stop control, then pad to a byte
    fn finish<W: Write>(&mut self,w: &mut BufWriter<W>) -> Result<(),std::io::Error> {
        if let Prefix::Code(c) = self.prefix {
            log::trace!("code: {}",c);
            self.out.put_code(self.nbits,c,w)?;
        }
        self.out.put_code(self.nbits,STOP_CODE,w)?;
        self.out.flush(w)
    }
}

/// Main compression function.
/// `expanded_in` is an object with the `Read` trait, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with the `Write` trait, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn compress<R,W>(expanded_in: &mut R,compressed_out: &mut W,opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read, W: Write {
    let mut reader = BufReader::new(expanded_in);
    let mut writer = BufWriter::new(compressed_out);
    let mut enc = Encoder::new(opt);
    enc.put_header(opt,&mut writer)?;
    let mut in_size: u64 = 0;
    let mut byte_in: [u8;1] = [0];
    log::debug!("entering encode loop");
    loop {
        match reader.read_exact(&mut byte_in) {
            Ok(()) => {
                enc.step(byte_in[0],&mut writer)?;
                in_size += 1;
            },
            Err(e) if e.kind()==ErrorKind::UnexpectedEof => {
                break;
            },
            Err(e) => return Err(Box::new(e))
        }
    }
    enc.finish(&mut writer)?;
    log::debug!("encoded {} bytes into {}",in_size,enc.out.bytes_written());
    Ok((in_size,enc.out.bytes_written()))
}

/// read one bit field, turning EOF mid-field into a stream error
fn get_field<R: Read>(inp: &mut BitReader,num_bits: usize,reader: &mut BufReader<R>) -> Result<usize,DYNERR> {
    match inp.get_code(num_bits,reader) {
        Ok(code) => Ok(code),
        Err(e) if e.kind()==ErrorKind::UnexpectedEof => {
            log::error!("stream ended before the stop code");
            Err(Box::new(crate::Error::TruncatedStream))
        },
        Err(e) => Err(Box::new(e))
    }
}

/// parse and validate the stream header
fn get_header<R: Read>(inp: &mut BitReader,reader: &mut BufReader<R>) -> Result<Options,DYNERR> {
    let max_bits = get_field(inp,HEADER_MAX_BITS,reader)?;
    let window = get_field(inp,HEADER_WINDOW,reader)? as u64;
    let escape = get_field(inp,HEADER_ESCAPE,reader)? == 1;
    if max_bits < 8 || max_bits > 24 {
        log::error!("header declares max code width {}",max_bits);
        return Err(Box::new(crate::Error::BadHeader));
    }
    Ok(Options { max_bits, window, escape })
}

/// Structure to perform LZW expansion, mirroring the encoder's table.
struct Decoder {
    table: Dictionary,
    recency: Recency,
    /// the previous data code, the table stays one entry behind this
    old_code: Prefix,
    /// trailing byte of the last decoded string
    final_k: u8,
    nbits: usize,
    max_bits: usize,
    window: u64,
    escape: bool,
    /// reverses prefix chains as they are walked
    stack: Vec<u8>
}

impl Decoder {
    fn new(opt: &Options) -> Self {
        Self {
            table: Dictionary::new(opt.max_bits,opt.escape),
            recency: Recency::new(1 << opt.max_bits),
            old_code: Prefix::Empty,
            final_k: 0,
            nbits: if opt.escape { 2 } else { 9 },
            max_bits: opt.max_bits,
            window: opt.window,
            escape: opt.escape,
            stack: Vec::new()
        }
    }
    /// Expand one data code into the bytes of its string and record the
    /// entry the encoder created when it emitted this code. Returns the
    /// number of bytes written.
    fn expand_code<W: Write>(&mut self,new_code: usize,writer: &mut BufWriter<W>) -> Result<u64,DYNERR> {
        self.recency.observe(new_code);
        let mut code = new_code;
        if self.table.find_by_code(code).is_none() {
            // the code refers to the entry the encoder is about to create,
            // which starts with the previous string and repeats its first byte
            match self.old_code {
                Prefix::Code(c) => {
                    self.stack.push(self.final_k);
                    code = c;
                },
                Prefix::Empty => {
                    log::error!("data code {} has no table entry",new_code);
                    return Err(Box::new(crate::Error::InvalidStream));
                }
            }
        }
        let mut entry = match self.table.find_by_code(code) {
            Some(e) => e,
            None => {
                log::error!("data code {} has no table entry",code);
                return Err(Box::new(crate::Error::InvalidStream));
            }
        };
        while let Prefix::Code(p) = entry.prefix {
            self.stack.push(entry.k);
            entry = self.table.find_by_code(p).unwrap(); // chains only reference earlier entries
        }
        self.final_k = entry.k;
        writer.write_all(&[self.final_k])?;
        let mut emitted: u64 = 1;
        while let Some(k) = self.stack.pop() {
            writer.write_all(&[k])?;
            emitted += 1;
        }
        log::trace!("code {} expands to {} bytes",new_code,emitted);
        if let Prefix::Code(c) = self.old_code {
            self.table.add(Prefix::Code(c),self.final_k);
        }
        self.old_code = Prefix::Code(new_code);
        Ok(emitted)
    }
}

/// Main expansion function.
/// `compressed_in` is an object with the `Read` trait, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `expanded_out` is an object with the `Write` trait, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size), or an error if the stream is ill formed.
pub fn expand<R,W>(compressed_in: &mut R,expanded_out: &mut W) -> Result<(u64,u64),DYNERR>
where R: Read, W: Write {
    let mut reader = BufReader::new(compressed_in);
    let mut writer = BufWriter::new(expanded_out);
    let mut inp = BitReader::new();
    let opt = get_header(&mut inp,&mut reader)?;
    log::debug!("header: max bits {}, window {}, escape {}",opt.max_bits,opt.window,opt.escape);
    let mut dec = Decoder::new(&opt);
    let mut out_size: u64 = 0;
    log::debug!("entering decode loop");
    loop {
        let code = get_field(&mut inp,dec.nbits,&mut reader)?;
        match code {
            STOP_CODE => break,
            GROW_CODE => {
                dec.nbits += 1;
                if dec.nbits > dec.max_bits {
                    log::error!("code width grew past the declared maximum");
                    return Err(Box::new(crate::Error::InvalidStream));
                }
                log::debug!("grow code width to {} bits",dec.nbits);
            },
            PRUNE_CODE => {
                if dec.window == 0 {
                    log::error!("prune code in a stream with pruning disabled");
                    return Err(Box::new(crate::Error::InvalidStream));
                }
                dec.table = dec.table.prune(&mut dec.recency,dec.window,&mut dec.old_code);
                dec.old_code = Prefix::Empty;
                dec.nbits = width_for(dec.table.highest_code());
            },
            ESCAPE_CODE => {
                if !dec.escape {
                    log::error!("escape code in a stream without escapes");
                    return Err(Box::new(crate::Error::InvalidStream));
                }
                let k = get_field(&mut inp,8,&mut reader)? as u8;
                log::trace!("escape byte {}",k);
                writer.write_all(&[k])?;
                out_size += 1;
                // the encoder's pending entry, then the byte's own code
                if let Prefix::Code(c) = dec.old_code {
                    dec.table.add(Prefix::Code(c),k);
                }
                let (temp,_) = dec.table.add(Prefix::Empty,k);
                dec.recency.observe(temp);
                dec.old_code = Prefix::Empty;
            },
            new_code => {
                out_size += dec.expand_code(new_code,&mut writer)?;
            }
        }
    }
    writer.flush()?;
    log::debug!("decoded {} bytes into {}",inp.bytes_read(),out_size);
    Ok((inp.bytes_read(),out_size))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

/// Convenience function, calls `expand` with a slice returning a Vec
pub fn expand_slice(slice: &[u8]) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    expand(&mut src,&mut ans)?;
    Ok(ans.into_inner())
}

// *************** TESTS *****************

#[cfg(test)]
fn escape_options() -> Options {
    Options {
        max_bits: 12,
        window: 0,
        escape: true
    }
}

/// deterministic bytes for the larger invertibility tests
#[cfg(test)]
fn xorshift_bytes(count: usize) -> Vec<u8> {
    let mut state: u32 = 0x2545f491;
    let mut ans = Vec::new();
    for _i in 0..count {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        ans.push(state as u8);
    }
    ans
}

#[test]
fn empty_stream() {
    // header (12,0,off), then only the stop code at 9 bits
    let compressed = compress_slice(&[],&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("6000000006").unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,Vec::<u8>::new());
}

#[test]
fn single_byte() {
    // the code stream is the preloaded code for 'A', then stop
    let compressed = compress_slice("A".as_bytes(),&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("600000008a03").unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,"A".as_bytes().to_vec());
}

#[test]
fn sizes_reported() {
    let mut src = Cursor::new("A".as_bytes());
    let mut dst: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    let (in_size,out_size) = compress(&mut src,&mut dst,&STD_OPTIONS).expect("compression failed");
    assert_eq!((in_size,out_size),(1,6));
    let mut src = Cursor::new(dst.into_inner());
    let mut dst: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    let (in_size,out_size) = expand(&mut src,&mut dst).expect("expansion failed");
    assert_eq!((in_size,out_size),(6,1));
}

#[test]
fn alternating_pattern() {
    // exercises match extension without the self-reference case
    let compressed = compress_slice("ABABABA".as_bytes(),&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("600000008a4682418060").unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,"ABABABA".as_bytes().to_vec());
}

#[test]
fn self_reference() {
    // a run of one byte makes the encoder emit codes one entry ahead of
    // what the decoder has built
    let compressed = compress_slice("AAAAAAAA".as_bytes(),&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("600000008b0482c10060").unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,"AAAAAAAA".as_bytes().to_vec());
}

#[test]
fn escaped_bytes() {
    // each first occurrence costs an escape control plus 8 raw bits, and
    // the first escape also grows the width from 2 to 3 bits
    let compressed = compress_slice("AB".as_bytes(),&escape_options()).expect("compression failed");
    assert_eq!(compressed,hex::decode("60000004414213").unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,"AB".as_bytes().to_vec());
}

#[test]
fn escape_happens_once() {
    // the second 'A' resolves through the table instead of a second escape
    let compressed = compress_slice("AA".as_bytes(),&escape_options()).expect("compression failed");
    assert_eq!(compressed,hex::decode("600000044163").unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,"AA".as_bytes().to_vec());
}

#[test]
fn empty_escape_stream() {
    // stop is sent at the initial 2 bit width
    let compressed = compress_slice(&[],&escape_options()).expect("compression failed");
    assert_eq!(compressed,hex::decode("60000007").unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,Vec::<u8>::new());
}

#[test]
fn width_grows_once() {
    // all 256 byte values then one repeat: at max_bits 10 the 513th entry
    // forces exactly one grow control, at max_bits 9 the table tops out
    // with no growth at all; both sizes are fixed by the code stream
    let mut data: Vec<u8> = (0..=255).collect();
    data.push(0);
    let opt = Options { max_bits: 10, window: 0, escape: false };
    let compressed = compress_slice(&data,&opt).expect("compression failed");
    assert_eq!(compressed.len(),296);
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,data);
    let opt = Options { max_bits: 9, window: 0, escape: false };
    let compressed = compress_slice(&data,&opt).expect("compression failed");
    assert_eq!(compressed.len(),294);
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,data);
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn invertibility_with_escape() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress_slice(test_data,&escape_options()).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn invertibility_with_pruning() {
    // random bytes at max_bits 9 fill the table repeatedly, so this runs
    // many prune cycles along with escapes
    let test_data = xorshift_bytes(10000);
    let opt = Options { max_bits: 9, window: 64, escape: true };
    let compressed = compress_slice(&test_data,&opt).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn invertibility_with_pruning_preloaded() {
    let test_data = xorshift_bytes(6000);
    let opt = Options { max_bits: 9, window: 30, escape: false };
    let compressed = compress_slice(&test_data,&opt).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn invertibility_long_run_with_pruning() {
    // long single byte runs hit the self-reference case across prunes
    let test_data = vec![b'a';4000];
    let opt = Options { max_bits: 9, window: 16, escape: true };
    let compressed = compress_slice(&test_data,&opt).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn truncation_fails() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    // cutting the stream anywhere after the header must fail without panic
    for len in 4..compressed.len() {
        assert!(expand_slice(&compressed[0..len]).is_err());
    }
}

#[test]
fn escape_rejected_in_plain_stream() {
    // header (12,0,off) followed by the escape control
    let stream = hex::decode("6000000000").unwrap();
    assert!(expand_slice(&stream).is_err());
}

#[test]
fn prune_rejected_in_unpruned_stream() {
    // header (12,0,off) followed by the prune control
    let stream = hex::decode("6000000004").unwrap();
    assert!(expand_slice(&stream).is_err());
}

#[test]
fn growth_past_max_rejected() {
    // header (9,0,off) followed by the grow control
    let stream = hex::decode("4800000002").unwrap();
    assert!(expand_slice(&stream).is_err());
}

#[test]
fn bad_header_rejected() {
    // 5 bit max width field holding 25
    let stream = hex::decode("c800000000").unwrap();
    assert!(expand_slice(&stream).is_err());
}
