//! Bit and byte cursors over borrowed input buffers.
//!
//! `ByteStream` is the marker-level cursor: every read is bounds checked
//! and an out-of-range access surfaces a `StreamError` instead of a panic,
//! so corrupt container data is always recoverable at the frame boundary.
//! The bit pumps are the entropy-level readers and follow the usual
//! peek/consume split so Huffman lookups can peek a full prefix at once.

use thiserror::Error;

use crate::bits::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
  #[error("Read of {} bytes at offset {} is beyond stream end ({} bytes)", len, pos, size)]
  OutOfRange { pos: usize, len: usize, size: usize },

  #[error("No marker found inside rest of buffer")]
  NoMarker,
}

type Result<T> = std::result::Result<T, StreamError>;

pub trait BitPump {
  fn peek_bits(&mut self, num: u32) -> u32;
  fn consume_bits(&mut self, num: u32);

  #[inline(always)]
  fn get_bits(&mut self, num: u32) -> u32 {
    if num == 0 {
      return 0;
    }
    let val = self.peek_bits(num);
    self.consume_bits(num);
    val
  }
}

/// Plain MSB-first bit reader without any byte unstuffing.
#[derive(Debug, Copy, Clone)]
pub struct BitPumpMSB<'a> {
  buffer: &'a [u8],
  pos: usize,
  bits: u64,
  nbits: u32,
}

impl<'a> BitPumpMSB<'a> {
  pub fn new(src: &'a [u8]) -> BitPumpMSB<'a> {
    BitPumpMSB {
      buffer: src,
      pos: 0,
      bits: 0,
      nbits: 0,
    }
  }

  /// Byte position of the next unconsumed bit, rounded down.
  #[inline(always)]
  pub fn get_pos(&self) -> usize {
    self.pos - ((self.nbits >> 3) as usize)
  }
}

impl<'a> BitPump for BitPumpMSB<'a> {
  #[inline(always)]
  fn peek_bits(&mut self, num: u32) -> u32 {
    while num > self.nbits {
      let byte = if self.pos < self.buffer.len() {
        let b = self.buffer[self.pos];
        self.pos += 1;
        b
      } else {
        // Zero-pad after the end so short reads do not fail here, the
        // block decoder stops on its own byte accounting.
        self.pos += 1;
        0
      };
      self.bits = (self.bits << 8) | (byte as u64);
      self.nbits += 8;
    }
    (self.bits >> (self.nbits - num)) as u32
  }

  #[inline(always)]
  fn consume_bits(&mut self, num: u32) {
    debug_assert!(num <= self.nbits);
    self.nbits -= num;
    self.bits &= (1 << self.nbits) - 1;
  }
}

/// MSB-first bit reader for lossless JPEG entropy data.
///
/// Handles the byte stuffing of the format: a 0xFF data byte is always
/// followed by a 0x00 pad byte which has to be dropped while refilling.
/// A 0xFF followed by anything else is a marker and ends the stream, from
/// then on the pump delivers zero bits instead of failing.
#[derive(Debug, Copy, Clone)]
pub struct BitPumpJpeg<'a> {
  buffer: &'a [u8],
  pos: usize,
  bits: u64,
  nbits: u32,
  finished: bool,
}

impl<'a> BitPumpJpeg<'a> {
  pub fn new(src: &'a [u8]) -> BitPumpJpeg<'a> {
    BitPumpJpeg {
      buffer: src,
      pos: 0,
      bits: 0,
      nbits: 0,
      finished: false,
    }
  }
}

impl<'a> BitPump for BitPumpJpeg<'a> {
  #[inline(always)]
  fn peek_bits(&mut self, num: u32) -> u32 {
    if num > self.nbits && !self.finished {
      if self.buffer.len() >= 4
        && self.pos < self.buffer.len() - 4
        && self.buffer[self.pos] != 0xff
        && self.buffer[self.pos + 1] != 0xff
        && self.buffer[self.pos + 2] != 0xff
        && self.buffer[self.pos + 3] != 0xff
      {
        let inbits = BEu32(self.buffer, self.pos) as u64;
        self.bits = (self.bits << 32) | inbits;
        self.pos += 4;
        self.nbits += 32;
      } else {
        // Slow path, one byte at a time with unstuffing
        let mut read_bytes = 0;
        while read_bytes < 4 && !self.finished {
          let byte = {
            if self.pos >= self.buffer.len() {
              self.finished = true;
              0
            } else {
              let nextbyte = self.buffer[self.pos];
              if nextbyte != 0xff {
                nextbyte
              } else if self.pos + 1 < self.buffer.len() && self.buffer[self.pos + 1] == 0x00 {
                self.pos += 1; // Skip the stuffed 0x00 after 0xff
                nextbyte
              } else {
                self.finished = true;
                0
              }
            }
          };
          self.bits = (self.bits << 8) | (byte as u64);
          self.pos += 1;
          self.nbits += 8;
          read_bytes += 1;
        }
      }
    }
    if num > self.nbits && self.finished {
      // Stuff with zeroes to not fail to read
      self.bits <<= 32;
      self.nbits += 32;
    }

    (self.bits >> (self.nbits - num)) as u32
  }

  #[inline(always)]
  fn consume_bits(&mut self, num: u32) {
    debug_assert!(num <= self.nbits);
    self.nbits -= num;
    self.bits &= (1 << self.nbits) - 1;
  }
}

/// Byte cursor over a borrowed slice with fully bounds-checked reads.
#[derive(Debug, Copy, Clone)]
pub struct ByteStream<'a> {
  buffer: &'a [u8],
  pos: usize,
  endian: Endian,
}

impl<'a> ByteStream<'a> {
  pub fn new(src: &'a [u8], endian: Endian) -> ByteStream<'a> {
    ByteStream { buffer: src, pos: 0, endian }
  }

  #[inline(always)]
  pub fn remaining_bytes(&self) -> usize {
    self.buffer.len() - self.pos
  }

  #[inline(always)]
  pub fn get_pos(&self) -> usize {
    self.pos
  }

  #[inline(always)]
  fn check(&self, len: usize) -> Result<()> {
    if self.pos + len > self.buffer.len() {
      Err(StreamError::OutOfRange {
        pos: self.pos,
        len,
        size: self.buffer.len(),
      })
    } else {
      Ok(())
    }
  }

  #[inline(always)]
  pub fn get_u8(&mut self) -> Result<u8> {
    self.check(1)?;
    let val = self.buffer[self.pos];
    self.pos += 1;
    Ok(val)
  }

  #[inline(always)]
  pub fn get_u16(&mut self) -> Result<u16> {
    self.check(2)?;
    let val = self.endian.read_u16(self.buffer, self.pos);
    self.pos += 2;
    Ok(val)
  }

  #[inline(always)]
  pub fn get_u32(&mut self) -> Result<u32> {
    self.check(4)?;
    let val = self.endian.read_u32(self.buffer, self.pos);
    self.pos += 4;
    Ok(val)
  }

  #[inline(always)]
  pub fn get_i64(&mut self) -> Result<i64> {
    self.check(8)?;
    let val = self.endian.read_i64(self.buffer, self.pos);
    self.pos += 8;
    Ok(val)
  }

  #[inline(always)]
  pub fn get_slice(&mut self, n: usize) -> Result<&'a [u8]> {
    self.check(n)?;
    let val = &self.buffer[self.pos..self.pos + n];
    self.pos += n;
    Ok(val)
  }

  #[inline(always)]
  pub fn consume_bytes(&mut self, num: usize) -> Result<()> {
    self.check(num)?;
    self.pos += num;
    Ok(())
  }

  /// Advance to the byte after the next 0xFF marker prefix, skipping fill
  /// bytes. On success the next `get_u8()` returns the marker code.
  pub fn skip_to_marker(&mut self) -> Result<usize> {
    let mut skip_count = 0;
    loop {
      if self.pos + 1 >= self.buffer.len() {
        return Err(StreamError::NoMarker);
      }
      if self.buffer[self.pos] == 0xFF && self.buffer[self.pos + 1] != 0 && self.buffer[self.pos + 1] != 0xFF {
        break;
      }
      self.pos += 1;
      skip_count += 1;
    }
    self.pos += 1; // Make the next byte the marker
    Ok(skip_count + 1)
  }
}
