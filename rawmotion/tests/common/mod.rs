// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

//! Fixture builders shared by the integration tests: a minimal lossless
//! JPEG encoder with a fixed Huffman table, a legacy block packer and a
//! synthetic container writer. All of it exists to produce byte streams
//! the library decoders accept, not to be a useful encoder.

#![allow(dead_code)]

/// Code counts per length (1..=16) for the fixed test table, followed by
/// the difference categories in canonical order. Covers categories 0..=16;
/// predictors 4-7 on 12-bit data can produce diffs needing category 13.
const DHT_BITS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0];
const DHT_VALUES: [u8; 17] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

/// Canonical (code, length) pair per difference category.
fn build_codes() -> [(u16, u8); 17] {
  let mut codes = [(0_u16, 0_u8); 17];
  let mut code: u16 = 0;
  let mut sym = 0;
  for len in 1..=16 {
    for _ in 0..DHT_BITS[len - 1] {
      codes[DHT_VALUES[sym] as usize] = (code, len as u8);
      sym += 1;
      code += 1;
    }
    code <<= 1;
  }
  codes
}

/// MSB-first bit writer with JPEG byte stuffing: every 0xFF data byte is
/// followed by a 0x00 pad byte.
struct JpegBitWriter {
  out: Vec<u8>,
  acc: u64,
  nbits: u32,
}

impl JpegBitWriter {
  fn new() -> Self {
    Self { out: Vec::new(), acc: 0, nbits: 0 }
  }

  fn put(&mut self, bits: u32, len: u8) {
    self.acc = (self.acc << len) | (bits as u64 & ((1_u64 << len) - 1));
    self.nbits += len as u32;
    while self.nbits >= 8 {
      let byte = (self.acc >> (self.nbits - 8)) as u8;
      self.out.push(byte);
      if byte == 0xFF {
        self.out.push(0x00);
      }
      self.nbits -= 8;
    }
  }

  fn finish(mut self) -> Vec<u8> {
    if self.nbits > 0 {
      let pad = 8 - self.nbits as u8;
      self.put(0, pad);
    }
    self.out
  }
}

fn push_marker(out: &mut Vec<u8>, code: u8) {
  out.push(0xFF);
  out.push(code);
}

/// Encode `data` (interleaved samples, `ncomp` components) as a lossless
/// JPEG stream the way MotionCam recorders do: SOI, DHT, SOF3, SOS,
/// entropy data, EOI. All components share Huffman table 0.
pub fn encode_ljpeg(data: &[u16], width: usize, height: usize, ncomp: usize, precision: usize, predictor: u8) -> Vec<u8> {
  assert_eq!(data.len(), width * height);
  assert_eq!(width % ncomp, 0);
  let sof_width = width / ncomp;
  let codes = build_codes();

  let mut out = Vec::new();
  push_marker(&mut out, 0xD8); // SOI

  push_marker(&mut out, 0xC4); // DHT
  let dht_len = 2 + 1 + 16 + DHT_VALUES.len() as u16;
  out.extend_from_slice(&dht_len.to_be_bytes());
  out.push(0x00); // class 0, table 0
  out.extend_from_slice(&DHT_BITS);
  out.extend_from_slice(&DHT_VALUES);

  push_marker(&mut out, 0xC3); // SOF3
  out.extend_from_slice(&(8 + 3 * ncomp as u16).to_be_bytes());
  out.push(precision as u8);
  out.extend_from_slice(&(height as u16).to_be_bytes());
  out.extend_from_slice(&(sof_width as u16).to_be_bytes());
  out.push(ncomp as u8);
  for c in 0..ncomp {
    out.push(c as u8); // component id
    out.push(0x11); // 1x1 subsampling
    out.push(0x00); // no quantization table
  }

  push_marker(&mut out, 0xDA); // SOS
  out.extend_from_slice(&(6 + 2 * ncomp as u16).to_be_bytes());
  out.push(ncomp as u8);
  for c in 0..ncomp {
    out.push(c as u8);
    out.push(0x00); // DC table 0
  }
  out.push(predictor);
  out.push(0x00); // Se
  out.push(0x00); // point transform 0

  let mut writer = JpegBitWriter::new();
  let mut emit = |diff: i32| {
    let cat = if diff == 0 { 0 } else { 32 - diff.unsigned_abs().leading_zeros() };
    let (code, len) = codes[cat as usize];
    writer.put(code as u32, len);
    if cat > 0 {
      let raw = if diff < 0 { diff + (1 << cat) - 1 } else { diff };
      writer.put(raw as u32, cat as u8);
    }
  };

  // Mirror of the decoder's prediction scheme
  let base = 1_i32 << (precision - 1);
  for c in 0..ncomp {
    emit(data[c] as i32 - base);
  }
  for row in 0..height {
    let startcol = if row == 0 { ncomp } else { 0 };
    for col in (startcol..width).step_by(ncomp) {
      for c in 0..ncomp {
        let p: i32 = if col == 0 {
          data[(row - 1) * width + c] as i32
        } else {
          let a = || data[row * width + col - ncomp + c] as i32;
          let b = || data[(row - 1) * width + col + c] as i32;
          let cc = || data[(row - 1) * width + col - ncomp + c] as i32;
          match (row, predictor) {
            (0, _) | (_, 1) => a(),
            (_, 2) => b(),
            (_, 3) => cc(),
            (_, 4) => a() + b() - cc(),
            (_, 5) => a() + ((b() - cc()) >> 1),
            (_, 6) => b() + ((a() - cc()) >> 1),
            (_, 7) => (a() + b()) >> 1,
            _ => panic!("unsupported predictor {}", predictor),
          }
        };
        emit(data[row * width + col + c] as i32 - p);
      }
    }
  }
  out.extend_from_slice(&writer.finish());

  push_marker(&mut out, 0xD9); // EOI
  out
}

/// Pack `data` into the legacy block format (compression type 6): raw
/// 16-bit blocks with reference 0, rows padded to 32 samples.
pub fn encode_mcpacked(data: &[u16], width: usize, height: usize) -> Vec<u8> {
  assert_eq!(data.len(), width * height);
  let padded = (width + 31) / 32 * 32;
  let mut out = Vec::new();
  for row in 0..height {
    let mut samples = vec![0_u16; padded];
    samples[..width].copy_from_slice(&data[row * width..(row + 1) * width]);
    for chunk in samples.chunks_exact(32) {
      for half in 0..2 {
        out.extend_from_slice(&(11_u16 << 12).to_le_bytes()); // 11 bits, reference 0
        for i in 0..16 {
          out.extend_from_slice(&chunk[2 * i + half].to_le_bytes());
        }
      }
    }
  }
  out
}

/// Pseudo-random but reproducible sample data below `1 << bits`.
pub fn sample_grid(width: usize, height: usize, bits: u32, seed: u32) -> Vec<u16> {
  let mut state = seed.wrapping_mul(2654435761).max(1);
  (0..width * height)
    .map(|_| {
      // xorshift32
      state ^= state << 13;
      state ^= state >> 17;
      state ^= state << 5;
      (state & ((1 << bits) - 1)) as u16
    })
    .collect()
}

/// Incrementally assembles a synthetic `.mcraw` byte stream.
pub struct ContainerBuilder {
  buf: Vec<u8>,
  frame_index: Vec<(i64, i64)>,
  audio_index: Vec<(i64, i64)>,
}

pub const ITEM_BUFFER: u32 = 0;
pub const ITEM_METADATA: u32 = 1;
pub const ITEM_BUFFER_INDEX: u32 = 2;
pub const ITEM_AUDIO_INDEX: u32 = 3;
pub const ITEM_AUDIO_DATA: u32 = 4;
pub const ITEM_AUDIO_DATA_METADATA: u32 = 5;

impl ContainerBuilder {
  pub fn new() -> Self {
    let mut builder = Self {
      buf: Vec::new(),
      frame_index: Vec::new(),
      audio_index: Vec::new(),
    };
    builder.buf.extend_from_slice(b"MOTION ");
    builder.buf.push(3);
    builder.item(
      ITEM_METADATA,
      br#"{"cameraModel":"Test Cam","fps":30.0,"audioChannels":2,"audioSampleRate":48000,"sensorArrangement":"RGGB"}"#,
    );
    builder
  }

  fn item(&mut self, typ: u32, payload: &[u8]) {
    self.buf.extend_from_slice(&typ.to_le_bytes());
    self.buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    self.buf.extend_from_slice(payload);
  }

  /// Append a frame buffer plus its metadata item and index it.
  pub fn add_frame(&mut self, timestamp: i64, compression_type: u32, width: usize, height: usize, payload: &[u8]) {
    let offset = self.buf.len() as i64;
    self.item(ITEM_BUFFER, payload);
    let meta = format!(
      r#"{{"width":{},"height":{},"bitsPerPixel":12,"timestamp":{},"compressionType":{},"sensorArrangement":"RGGB","iso":100,"exposureTime":10000000}}"#,
      width, height, timestamp, compression_type
    );
    self.item(ITEM_METADATA, meta.as_bytes());
    self.frame_index.push((offset, timestamp));
  }

  /// Index a frame timestamp at an arbitrary byte offset without writing
  /// any payload. For corruption tests.
  pub fn index_frame_at(&mut self, timestamp: i64, offset: i64) {
    self.frame_index.push((offset, timestamp));
  }

  /// Byte offset the next appended item will start at.
  pub fn next_offset(&self) -> i64 {
    self.buf.len() as i64
  }

  /// Append an audio chunk, optionally preceded by its metadata record.
  pub fn add_audio(&mut self, timestamp: i64, samples: &[u8], with_metadata: bool) {
    let offset = self.buf.len() as i64;
    if with_metadata {
      self.item(ITEM_AUDIO_DATA_METADATA, br#"{"timestamp":0}"#);
    }
    self.item(ITEM_AUDIO_DATA, samples);
    self.audio_index.push((offset, timestamp));
  }

  /// Write the trailing index structures and return the file bytes. The
  /// frame index keeps insertion order, deliberately not sorted.
  pub fn finish(mut self) -> Vec<u8> {
    if !self.audio_index.is_empty() {
      let mut table = Vec::new();
      for (offset, timestamp) in &self.audio_index {
        table.extend_from_slice(&offset.to_le_bytes());
        table.extend_from_slice(&timestamp.to_le_bytes());
      }
      self.item(ITEM_AUDIO_INDEX, &table);
    }

    let index_data_offset = self.buf.len() as i64;
    for (offset, timestamp) in &self.frame_index {
      self.buf.extend_from_slice(&offset.to_le_bytes());
      self.buf.extend_from_slice(&timestamp.to_le_bytes());
    }

    self.buf.extend_from_slice(&ITEM_BUFFER_INDEX.to_le_bytes());
    self.buf.extend_from_slice(&16_u32.to_le_bytes());
    self.buf.extend_from_slice(&0x8A90_5612_u32.to_le_bytes());
    self.buf.extend_from_slice(&(self.frame_index.len() as u32).to_le_bytes());
    self.buf.extend_from_slice(&index_data_offset.to_le_bytes());
    self.buf
  }
}
