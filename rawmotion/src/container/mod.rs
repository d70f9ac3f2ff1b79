// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

//! MotionCam raw video container (`.mcraw`).
//!
//! File layout: an 8-byte header (`"MOTION "` + version), a stream of
//! `{type, size}` tagged items (JSON metadata blobs, compressed frame
//! buffers, audio chunks) and a fixed-layout BufferIndex footer in the
//! last item of the file. The footer points at a table of
//! `{offset, timestamp}` pairs which is sorted by timestamp after load,
//! the on-disk order is whatever the recorder managed to flush.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use memmap2::Mmap;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bits::Endian;
use crate::cfa::CfaPattern;
use crate::decompressors::ljpeg::{LjpegDecompressor, LjpegError};
use crate::decompressors::mcpacked::{self, McpackedError};
use crate::pixarray::PixU16;
use crate::pumps::{ByteStream, StreamError};

/// Fixed identifier in the file header.
pub const CONTAINER_IDENT: &[u8; 7] = b"MOTION ";
/// Only container version we understand.
pub const CONTAINER_VERSION: u8 = 3;
/// Magic number of the BufferIndex footer.
pub const INDEX_MAGIC: u32 = 0x8A90_5612;

/// Frame compression selector values in the frame metadata.
pub const COMPRESSION_LEGACY: u32 = 6;
pub const COMPRESSION_LJPEG: u32 = 7;

const HEADER_BYTES: usize = 8;
const ITEM_BYTES: usize = 8;
const FOOTER_BYTES: usize = 16;
const OFFSET_PAIR_BYTES: usize = 16;

#[derive(Error, Debug)]
pub enum ContainerError {
  #[error("Invalid container: {}", _0)]
  InvalidContainer(String),

  #[error("No frame with timestamp {}", _0)]
  FrameNotFound(i64),

  #[error("No audio chunk with timestamp {}", _0)]
  AudioNotFound(i64),

  #[error("Invalid buffer item: {}", _0)]
  InvalidBuffer(String),

  #[error("Invalid metadata item: {}", _0)]
  InvalidMetadata(String),

  #[error("Frame data incomplete: {} of {} bytes decoded", consumed, expected)]
  TruncatedFrame { consumed: usize, expected: usize },

  #[error("Decode canceled")]
  Canceled,

  #[error("I/O error: {}", _0)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Stream(#[from] StreamError),

  #[error(transparent)]
  Ljpeg(#[from] LjpegError),

  #[error(transparent)]
  Mcpacked(#[from] McpackedError),
}

impl From<serde_json::Error> for ContainerError {
  fn from(err: serde_json::Error) -> Self {
    Self::InvalidMetadata(err.to_string())
  }
}

type Result<T> = std::result::Result<T, ContainerError>;

/// Item tag preceding every payload block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum ItemType {
  Buffer = 0,
  Metadata = 1,
  BufferIndex = 2,
  AudioIndex = 3,
  AudioData = 4,
  AudioDataMetadata = 5,
}

#[derive(Debug, Copy, Clone)]
struct Item {
  typ: u32,
  size: usize,
}

impl Item {
  fn parse(stream: &mut ByteStream) -> Result<Self> {
    let typ = stream.get_u32()?;
    let size = stream.get_u32()? as usize;
    Ok(Item { typ, size })
  }

  fn expect(stream: &mut ByteStream<'_>, wanted: ItemType) -> Result<Self> {
    let item = Self::parse(stream)?;
    if item.typ != u32::from(wanted) {
      let msg = format!("expected {:?} item, found tag {}", wanted, item.typ);
      return Err(match wanted {
        ItemType::Buffer | ItemType::AudioData => ContainerError::InvalidBuffer(msg),
        ItemType::Metadata | ItemType::AudioDataMetadata => ContainerError::InvalidMetadata(msg),
        _ => ContainerError::InvalidContainer(msg),
      });
    }
    Ok(item)
  }
}

/// One entry of the frame or audio index.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BufferOffset {
  pub offset: i64,
  pub timestamp: i64,
}

/// Recording-level metadata from the leading JSON blob.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerMetadata {
  pub camera_model: String,
  pub fps: f32,
  pub audio_channels: u32,
  pub audio_sample_rate: u32,
  pub sensor_arrangement: CfaPattern,
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Per-frame metadata from the JSON item following each frame buffer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameMetadata {
  pub width: usize,
  pub height: usize,
  pub bits_per_pixel: usize,
  pub timestamp: i64,
  pub compression_type: u32,
  pub sensor_arrangement: CfaPattern,
  pub iso: u32,
  pub exposure_time: i64,
}

/// A decoded frame: linear 16-bit samples plus its metadata.
#[derive(Debug, Clone)]
pub struct RawFrame {
  pub pixels: PixU16,
  pub metadata: FrameMetadata,
}

enum Source {
  Mmap(Mmap),
  Buf(Arc<Vec<u8>>),
}

impl Source {
  fn buf(&self) -> &[u8] {
    match self {
      Self::Mmap(map) => map,
      Self::Buf(vec) => vec,
    }
  }
}

/// Open handle on a MotionCam container with the parsed index.
pub struct McrawFile {
  source: Source,
  metadata: ContainerMetadata,
  frames: Vec<BufferOffset>,
  audio: Vec<BufferOffset>,
}

impl McrawFile {
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let file = File::open(path.as_ref())?;
    let mmap = unsafe { Mmap::map(&file)? };
    Self::from_source(Source::Mmap(mmap))
  }

  pub fn open_buffer(buf: Vec<u8>) -> Result<Self> {
    Self::from_source(Source::Buf(Arc::new(buf)))
  }

  fn from_source(source: Source) -> Result<Self> {
    let buf = source.buf();
    if buf.len() < HEADER_BYTES + 2 * ITEM_BYTES + FOOTER_BYTES {
      return Err(ContainerError::InvalidContainer(format!("file too short ({} bytes)", buf.len())));
    }
    if &buf[0..7] != CONTAINER_IDENT {
      return Err(ContainerError::InvalidContainer("bad identifier".into()));
    }
    if buf[7] != CONTAINER_VERSION {
      return Err(ContainerError::InvalidContainer(format!("unsupported version {}", buf[7])));
    }

    // Leading metadata blob
    let mut stream = ByteStream::new(buf, Endian::Little);
    stream.consume_bytes(HEADER_BYTES)?;
    let meta_item = Item::expect(&mut stream, ItemType::Metadata)?;
    let metadata: ContainerMetadata = serde_json::from_slice(stream.get_slice(meta_item.size)?)?;

    // Fixed-size footer: one item header plus the BufferIndex record
    let footer_pos = buf.len() - ITEM_BYTES - FOOTER_BYTES;
    let mut footer = ByteStream::new(&buf[footer_pos..], Endian::Little);
    Item::expect(&mut footer, ItemType::BufferIndex)?;
    let magic = footer.get_u32()?;
    if magic != INDEX_MAGIC {
      return Err(ContainerError::InvalidContainer(format!("bad index magic {:#010x}", magic)));
    }
    let num_offsets = footer.get_u32()? as usize;
    let index_data_offset = footer.get_i64()?;
    if index_data_offset < 0 || (index_data_offset as usize) + num_offsets * OFFSET_PAIR_BYTES > buf.len() {
      return Err(ContainerError::InvalidContainer("index table out of bounds".into()));
    }

    let mut index = ByteStream::new(&buf[index_data_offset as usize..], Endian::Little);
    let mut frames = Vec::with_capacity(num_offsets);
    for _ in 0..num_offsets {
      let offset = index.get_i64()?;
      let timestamp = index.get_i64()?;
      frames.push(BufferOffset { offset, timestamp });
    }
    // On-disk order is write order, not capture order
    frames.sort_by_key(|entry| entry.timestamp);

    let audio = Self::scan_audio_index(buf, &frames, footer_pos).unwrap_or_else(|err| {
      warn!("mcraw: audio index scan failed, continuing without audio: {}", err);
      Vec::new()
    });

    debug!("mcraw: {} frames, {} audio chunks", frames.len(), audio.len());
    Ok(Self {
      source,
      metadata,
      frames,
      audio,
    })
  }

  /// Walk items forward from the last indexed frame to find the optional
  /// audio index. Unknown item types end the scan, older writers put
  /// other records here.
  fn scan_audio_index(buf: &[u8], frames: &[BufferOffset], footer_pos: usize) -> Result<Vec<BufferOffset>> {
    let mut pos = match frames.iter().map(|f| f.offset).max() {
      Some(last) if last >= 0 => last as usize,
      _ => return Ok(Vec::new()),
    };

    while pos + ITEM_BYTES <= footer_pos {
      let mut stream = ByteStream::new(&buf[pos..], Endian::Little);
      let item = Item::parse(&mut stream)?;
      match ItemType::try_from(item.typ) {
        Ok(ItemType::AudioIndex) => {
          let mut entries = ByteStream::new(stream.get_slice(item.size)?, Endian::Little);
          let mut audio = Vec::with_capacity(item.size / OFFSET_PAIR_BYTES);
          for _ in 0..item.size / OFFSET_PAIR_BYTES {
            let offset = entries.get_i64()?;
            let timestamp = entries.get_i64()?;
            audio.push(BufferOffset { offset, timestamp });
          }
          audio.sort_by_key(|entry| entry.timestamp);
          return Ok(audio);
        }
        Ok(ItemType::BufferIndex) => break,
        Ok(_) => pos += ITEM_BYTES + item.size,
        Err(_) => {
          debug!("mcraw: unknown item tag {} ends index scan", item.typ);
          break;
        }
      }
    }
    Ok(Vec::new())
  }

  pub fn metadata(&self) -> &ContainerMetadata {
    &self.metadata
  }

  /// Frame index entries, sorted by timestamp.
  pub fn frames(&self) -> &[BufferOffset] {
    &self.frames
  }

  pub fn frame_count(&self) -> usize {
    self.frames.len()
  }

  /// Audio index entries, sorted by timestamp. Empty when the recording
  /// carries no audio.
  pub fn audio_chunks(&self) -> &[BufferOffset] {
    &self.audio
  }

  fn lookup(index: &[BufferOffset], timestamp: i64) -> Option<usize> {
    index.binary_search_by_key(&timestamp, |entry| entry.timestamp).ok()
  }

  /// Decode the frame recorded at `timestamp`.
  pub fn load_frame(&self, timestamp: i64) -> Result<RawFrame> {
    let buf = self.source.buf();
    let entry = Self::lookup(&self.frames, timestamp)
      .map(|i| self.frames[i])
      .ok_or(ContainerError::FrameNotFound(timestamp))?;
    if entry.offset < 0 || entry.offset as usize >= buf.len() {
      return Err(ContainerError::InvalidBuffer(format!("frame offset {} out of bounds", entry.offset)));
    }

    let mut stream = ByteStream::new(&buf[entry.offset as usize..], Endian::Little);
    let buffer_item = Item::expect(&mut stream, ItemType::Buffer)?;
    let payload = stream.get_slice(buffer_item.size)?;
    let meta_item = Item::expect(&mut stream, ItemType::Metadata)?;
    let metadata: FrameMetadata = serde_json::from_slice(stream.get_slice(meta_item.size)?)?;

    if metadata.width == 0 || metadata.height == 0 {
      return Err(ContainerError::InvalidMetadata(format!(
        "bad frame geometry {}x{}",
        metadata.width, metadata.height
      )));
    }

    let pixels = match metadata.compression_type {
      COMPRESSION_LEGACY => {
        let mut out = vec![0_u16; metadata.width * metadata.height];
        let consumed = mcpacked::decode(&mut out, metadata.width, metadata.height, payload)?;
        if consumed < payload.len() {
          return Err(ContainerError::TruncatedFrame {
            consumed,
            expected: payload.len(),
          });
        }
        PixU16::new_with(out, metadata.width, metadata.height)
      }
      COMPRESSION_LJPEG => {
        let ljpeg = LjpegDecompressor::new(payload)?;
        if ljpeg.width() != metadata.width || ljpeg.height() != metadata.height {
          return Err(ContainerError::InvalidBuffer(format!(
            "frame geometry mismatch: stream {}x{}, metadata {}x{}",
            ljpeg.width(),
            ljpeg.height(),
            metadata.width,
            metadata.height
          )));
        }
        PixU16::new_with(ljpeg.decode_frame()?, metadata.width, metadata.height)
      }
      other => {
        return Err(ContainerError::InvalidMetadata(format!("unknown compression type {}", other)));
      }
    };

    Ok(RawFrame { pixels, metadata })
  }

  /// Raw audio chunk bytes for an indexed timestamp.
  pub fn load_audio(&self, timestamp: i64) -> Result<Vec<u8>> {
    let buf = self.source.buf();
    let entry = Self::lookup(&self.audio, timestamp)
      .map(|i| self.audio[i])
      .ok_or(ContainerError::AudioNotFound(timestamp))?;
    if entry.offset < 0 || entry.offset as usize >= buf.len() {
      return Err(ContainerError::InvalidBuffer(format!("audio offset {} out of bounds", entry.offset)));
    }

    let mut stream = ByteStream::new(&buf[entry.offset as usize..], Endian::Little);
    let mut item = Item::parse(&mut stream)?;
    if item.typ == u32::from(ItemType::AudioDataMetadata) {
      // Optional metadata record in front of the samples
      stream.consume_bytes(item.size)?;
      item = Item::parse(&mut stream)?;
    }
    if item.typ != u32::from(ItemType::AudioData) {
      return Err(ContainerError::InvalidBuffer(format!("expected AudioData item, found tag {}", item.typ)));
    }
    Ok(stream.get_slice(item.size)?.to_vec())
  }

  /// Decode every frame in timestamp order, handing each to `sink`.
  ///
  /// Cancellation is cooperative: the flag is checked between frames,
  /// never mid-frame.
  pub fn decode_frames<F>(&self, cancel: &AtomicBool, mut sink: F) -> Result<()>
  where
    F: FnMut(RawFrame) -> Result<()>,
  {
    for entry in &self.frames {
      if cancel.load(Ordering::Relaxed) {
        return Err(ContainerError::Canceled);
      }
      sink(self.load_frame(entry.timestamp)?)?;
    }
    Ok(())
  }
}
