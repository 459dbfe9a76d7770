//! Bit packing for the variable width code stream.
//!
//! Codes are packed MSB-first: the most significant bit of a code is the
//! first bit on the wire, and bytes spill out as the accumulator fills.
//! We rely on `bit_vec::BitVec` to hold the in-flight bits on both sides.

use bit_vec::BitVec;
use std::io::{Read,Write,BufReader,BufWriter,Error};

/// Packs variable width codes onto a byte stream.
pub struct BitWriter {
    bits: BitVec,
    written: u64
}

/// Unpacks variable width codes from a byte stream.
pub struct BitReader {
    bits: BitVec,
    ptr: usize,
    read: u64
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
            written: 0
        }
    }
    /// append the low `num_bits` bits of `code`, spilling any completed
    /// bytes to `writer`
    pub fn put_code<W: Write>(&mut self,num_bits: usize,code: usize,writer: &mut BufWriter<W>) -> Result<(),Error> {
        for i in (0..num_bits).rev() {
            self.bits.push(code >> i & 1 > 0);
        }
        self.spill(writer)
    }
    /// write out every whole byte, keeping any trailing partial byte
    fn spill<W: Write>(&mut self,writer: &mut BufWriter<W>) -> Result<(),Error> {
        let whole = self.bits.len() / 8;
        if whole == 0 {
            return Ok(());
        }
        let bytes = self.bits.to_bytes();
        writer.write_all(&bytes[..whole])?;
        self.written += whole as u64;
        let mut rest = BitVec::new();
        for i in whole * 8..self.bits.len() {
            rest.push(self.bits.get(i).unwrap());
        }
        self.bits = rest;
        Ok(())
    }
    /// pad the final partial byte with zeros and push everything out
    pub fn flush<W: Write>(&mut self,writer: &mut BufWriter<W>) -> Result<(),Error> {
        while self.bits.len() % 8 > 0 {
            self.bits.push(false);
        }
        self.spill(writer)?;
        writer.flush()
    }
    /// bytes emitted so far, only whole bytes count until a flush
    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl BitReader {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
            ptr: 0,
            read: 0
        }
    }
    /// keep the bit vector small, we don't need the bits behind us
    fn drop_leading_bits(&mut self) {
        let cpy = self.bits.clone();
        self.bits = BitVec::new();
        for i in self.ptr..cpy.len() {
            self.bits.push(cpy.get(i).unwrap());
        }
        self.ptr = 0;
    }
    /// Get the next bit, reading from the stream as needed.
    /// `reader` should not be advanced outside this function until
    /// decoding is done.
    fn get_bit<R: Read>(&mut self,reader: &mut BufReader<R>) -> Result<u8,Error> {
        match self.bits.get(self.ptr) {
            Some(bit) => {
                self.ptr += 1;
                Ok(bit as u8)
            },
            None => {
                let mut by: [u8;1] = [0];
                reader.read_exact(&mut by)?;
                self.read += 1;
                if self.bits.len() > 512 {
                    self.drop_leading_bits();
                }
                self.bits.append(&mut BitVec::from_bytes(&by));
                self.get_bit(reader)
            }
        }
    }
    /// Read the next `num_bits` as an unsigned integer. If the underlying
    /// stream ends mid-field the `UnexpectedEof` error passes through.
    pub fn get_code<R: Read>(&mut self,num_bits: usize,reader: &mut BufReader<R>) -> Result<usize,Error> {
        let mut ans: usize = 0;
        for _i in 0..num_bits {
            ans <<= 1;
            ans |= self.get_bit(reader)? as usize;
        }
        Ok(ans)
    }
    /// bytes consumed from the underlying stream so far
    pub fn bytes_read(&self) -> u64 {
        self.read
    }
}

// *************** TESTS *****************

#[cfg(test)]
use std::io::{Cursor,ErrorKind};

#[test]
fn msb_packing() {
    let mut cur: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    {
        let mut writer = BufWriter::new(&mut cur);
        let mut coder = BitWriter::new();
        coder.put_code(3,0b101,&mut writer).expect("write failed");
        coder.put_code(6,0b110011,&mut writer).expect("write failed");
        coder.flush(&mut writer).expect("flush failed");
        assert_eq!(coder.bytes_written(),2);
    }
    assert_eq!(cur.into_inner(),vec![0b10111001,0b10000000]);
}

#[test]
fn codes_roundtrip() {
    let mut cur: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    {
        let mut writer = BufWriter::new(&mut cur);
        let mut coder = BitWriter::new();
        coder.put_code(5,12,&mut writer).expect("write failed");
        coder.put_code(24,300,&mut writer).expect("write failed");
        coder.put_code(2,3,&mut writer).expect("write failed");
        coder.put_code(9,511,&mut writer).expect("write failed");
        coder.flush(&mut writer).expect("flush failed");
    }
    let mut reader = BufReader::new(Cursor::new(cur.into_inner()));
    let mut decoder = BitReader::new();
    assert_eq!(decoder.get_code(5,&mut reader).unwrap(),12);
    assert_eq!(decoder.get_code(24,&mut reader).unwrap(),300);
    assert_eq!(decoder.get_code(2,&mut reader).unwrap(),3);
    assert_eq!(decoder.get_code(9,&mut reader).unwrap(),511);
}

#[test]
fn eof_mid_field() {
    let mut reader = BufReader::new(Cursor::new(vec![0xff]));
    let mut decoder = BitReader::new();
    assert_eq!(decoder.get_code(5,&mut reader).unwrap(),0b11111);
    let err = decoder.get_code(5,&mut reader).unwrap_err();
    assert_eq!(err.kind(),ErrorKind::UnexpectedEof);
}
