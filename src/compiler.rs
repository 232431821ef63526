use std::io::Write;
use std::path::Path;
use std::time::{
  Duration,
  Instant,
};

use rayon::prelude::*;

use crate::chunk::HalaChunkWriter;
use crate::chunk::writer::serialize_batch;
use crate::config::HalaCompileOptions;
use crate::error::HalaGeometryError;
use crate::geometry::{
  HalaBatch,
  HalaBatchSink,
  HalaLayoutFlags,
  HalaPostProcessor,
  HalaSplitter,
  HalaTriangleSoup,
  HalaVertexLayout,
};
use crate::geometry::splitter::{
  HalaPackOptions,
  HalaSplitStats,
};
use crate::loader::HalaSoupLoader;

/// The statistics of one compile.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct HalaCompileStats {
  pub num_source_items: u32,
  pub num_triangles: u32,
  pub num_groups: u32,
  pub num_batches: u32,
  pub num_primitives: u32,
  /// Vertices written, after vertex fetch optimization.
  pub num_vertices: u64,
  pub num_indices: u64,
  /// Welds of byte-identical vertices from different source corners.
  pub num_conflicts: u64,
  pub bytes_written: u64,
  pub parse_time: Duration,
  pub reorder_time: Duration,
  pub convert_time: Duration,
}

/// Post-processes and writes every batch as soon as it is flushed.
struct HalaStreamingSink<'a, W: Write> {
  writer: &'a mut HalaChunkWriter<W>,
  compress: bool,
  num_vertices: u64,
  num_indices: u64,
}

impl<'a, W: Write> HalaBatchSink for HalaStreamingSink<'a, W> {
  fn consume(&mut self, batch: &mut HalaBatch, layout: &HalaVertexLayout) -> Result<(), HalaGeometryError> {
    HalaPostProcessor::process(batch, layout, self.compress)?;
    self.writer.write_batch(batch, layout)?;
    self.num_vertices += batch.num_vertices as u64;
    self.num_indices += batch.indices.len() as u64;
    Ok(())
  }
}

/// Keeps a snapshot of every flushed batch for parallel post-processing.
#[derive(Default)]
struct HalaDeferredSink {
  batches: Vec<HalaBatch>,
}

impl HalaBatchSink for HalaDeferredSink {
  fn consume(&mut self, batch: &mut HalaBatch, _layout: &HalaVertexLayout) -> Result<(), HalaGeometryError> {
    self.batches.push(batch.clone());
    Ok(())
  }
}

/// The geometry compiler, from source file to chunk stream.
pub struct HalaGeometryCompiler {
  options: HalaCompileOptions,
}

/// The implementation of the geometry compiler.
impl HalaGeometryCompiler {
  /// Create a new compiler.
  /// param options: The compile options.
  /// return: The compiler.
  pub fn new(options: HalaCompileOptions) -> Self {
    Self {
      options: options.sanitized(),
    }
  }

  pub fn options(&self) -> &HalaCompileOptions {
    &self.options
  }

  /// Decide the vertex layout for the soup.
  /// param soup: The triangle soup.
  /// return: The vertex layout.
  pub fn build_layout(&self, soup: &HalaTriangleSoup) -> HalaVertexLayout {
    let has_tangent = self.options.tangent && soup.has_normal && soup.has_texcoord;
    if self.options.tangent && !has_tangent {
      log::warn!("Tangents need both normals and texture coordinates, tangent output is disabled.");
    }
    HalaVertexLayout::build(&HalaLayoutFlags {
      has_color: soup.has_color,
      has_barycentric: self.options.barycentric,
      has_texcoord: soup.has_texcoord,
      has_normal: soup.has_normal,
      has_tangent,
      normal_packing: self.options.normal_packing,
      texcoord_packing: self.options.texcoord_packing,
    })
  }

  /// Compile a source file into a geometry file.
  /// param input: The source file path.
  /// param output: The output file path.
  /// return: The statistics.
  pub fn compile_file<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output: Q) -> Result<HalaCompileStats, HalaGeometryError> {
    let output = output.as_ref();

    let parse_start = Instant::now();
    let soup = HalaSoupLoader::load(input, self.options.barycentric)?;
    let parse_time = parse_start.elapsed();

    let file = std::fs::File::create(output)
      .map_err(|err| HalaGeometryError::io(&format!("Create output file \"{:?}\" failed.", output), err))?;
    let (_, mut stats) = self.compile_soup(soup, std::io::BufWriter::new(file))?;
    stats.parse_time = parse_time;

    log::info!("parse {:.6} [s], tri reorder {:.6} [s], convert {:.6} [s]",
      stats.parse_time.as_secs_f64(), stats.reorder_time.as_secs_f64(), stats.convert_time.as_secs_f64());
    Ok(stats)
  }

  /// Compile a loaded soup into a chunk stream.
  /// param soup: The triangle soup.
  /// param writer: The output stream.
  /// return: The output stream and the statistics.
  pub fn compile_soup<W: Write>(&self, mut soup: HalaTriangleSoup, writer: W) -> Result<(W, HalaCompileStats), HalaGeometryError> {
    if let Some(msg) = soup.find_invalid_corner() {
      return Err(HalaGeometryError::input(&format!("Invalid triangle soup: {}.", msg)));
    }

    let mut stats = HalaCompileStats {
      num_source_items: soup.num_source_items,
      num_triangles: soup.triangles.len() as u32,
      num_groups: soup.groups.len() as u32,
      ..Default::default()
    };

    let reorder_start = Instant::now();
    soup.scale(self.options.scale);
    if self.options.ccw {
      soup.reverse_winding();
    }
    soup.sort_groups_by_material();
    stats.reorder_time = reorder_start.elapsed();

    let convert_start = Instant::now();
    let layout = self.build_layout(&soup);
    let pack_options = HalaPackOptions {
      flip_v: self.options.flip_v,
    };
    let mut chunk_writer = HalaChunkWriter::new(writer, self.options.compress, self.options.obb_steps);

    let split_stats = if self.options.parallel {
      self.convert_parallel(&soup, &layout, pack_options, &mut chunk_writer, &mut stats)?
    } else {
      let mut sink = HalaStreamingSink {
        writer: &mut chunk_writer,
        compress: self.options.compress,
        num_vertices: 0,
        num_indices: 0,
      };
      let split_stats = HalaSplitter::new(&soup, &layout, pack_options).run(&mut sink)?;
      stats.num_vertices = sink.num_vertices;
      stats.num_indices = sink.num_indices;
      split_stats
    };
    stats.num_batches = split_stats.num_batches;
    stats.num_primitives = split_stats.num_primitives;
    stats.num_conflicts = split_stats.num_conflicts;
    stats.bytes_written = chunk_writer.bytes_written();
    let writer = chunk_writer.finish()?;
    stats.convert_time = convert_start.elapsed();

    log::info!("size: {}", stats.bytes_written);
    if stats.num_conflicts > 0 {
      log::info!("{} extra merges of byte-identical vertices.", stats.num_conflicts);
    }
    log::info!("# {}, g {}, b {}, p {}, v {}, i {}",
      stats.num_source_items, stats.num_groups, stats.num_batches, stats.num_primitives, stats.num_vertices, stats.num_indices);
    Ok((writer, stats))
  }

  /// Weld sequentially, then post-process and serialize the batches in parallel.
  /// The chunks are appended in batch order.
  fn convert_parallel<W: Write>(
    &self,
    soup: &HalaTriangleSoup,
    layout: &HalaVertexLayout,
    pack_options: HalaPackOptions,
    chunk_writer: &mut HalaChunkWriter<W>,
    stats: &mut HalaCompileStats,
  ) -> Result<HalaSplitStats, HalaGeometryError> {
    let mut sink = HalaDeferredSink::default();
    let split_stats = HalaSplitter::new(soup, layout, pack_options).run(&mut sink)?;

    let compress = self.options.compress;
    let obb_steps = self.options.obb_steps;
    let serialized = sink.batches.par_iter_mut()
      .map(|batch| {
        HalaPostProcessor::process(batch, layout, compress)?;
        serialize_batch(batch, layout, compress, obb_steps)
      })
      .collect::<Result<Vec<_>, _>>()?;

    for (batch, data) in sink.batches.iter().zip(serialized.iter()) {
      chunk_writer.write_serialized(data)?;
      stats.num_vertices += batch.num_vertices as u64;
      stats.num_indices += batch.indices.len() as u64;
    }
    Ok(split_stats)
  }
}

#[cfg(test)]
mod tests {
  use glam::Vec3;

  use super::*;
  use crate::geometry::{
    HalaGroup,
    HalaTriangle,
    HalaVertexAttributeIndex,
  };

  fn quad_soup() -> HalaTriangleSoup {
    let corner = |p| HalaVertexAttributeIndex::new(p, None, None);
    HalaTriangleSoup {
      positions: vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
      ],
      triangles: vec![
        HalaTriangle { corners: [corner(0), corner(1), corner(2)] },
        HalaTriangle { corners: [corner(0), corner(2), corner(3)] },
      ],
      groups: vec![HalaGroup {
        start_triangle: 0,
        num_triangles: 2,
        name: "quad".to_string(),
        material: "m".to_string(),
      }],
      ..Default::default()
    }
  }

  #[test]
  fn tangent_request_is_downgraded_without_uvs() {
    let compiler = HalaGeometryCompiler::new(HalaCompileOptions {
      tangent: true,
      ..Default::default()
    });
    let mut soup = quad_soup();
    soup.has_normal = true;
    let layout = compiler.build_layout(&soup);
    assert!(!layout.has(crate::geometry::HalaAttribute::Tangent));
  }

  #[test]
  fn quad_compiles_with_welding() {
    let compiler = HalaGeometryCompiler::new(HalaCompileOptions::default());
    let (output, stats) = compiler.compile_soup(quad_soup(), Vec::new()).unwrap();
    assert_eq!(stats.num_batches, 1);
    assert_eq!(stats.num_primitives, 1);
    assert_eq!(stats.num_vertices, 4);
    assert_eq!(stats.num_indices, 6);
    assert_eq!(stats.bytes_written, output.len() as u64);
  }

  #[test]
  fn out_of_range_corner_is_an_input_error() {
    let mut soup = quad_soup();
    soup.triangles[1].corners[2] = HalaVertexAttributeIndex::new(7, None, None);
    let compiler = HalaGeometryCompiler::new(HalaCompileOptions::default());
    let err = compiler.compile_soup(soup, Vec::new()).unwrap_err();
    assert_eq!(err.kind(), crate::error::HalaGeometryErrorKind::Input);
  }

  #[test]
  fn group_past_the_triangles_is_an_input_error() {
    let mut soup = quad_soup();
    soup.groups[0].num_triangles = u32::MAX;
    let compiler = HalaGeometryCompiler::new(HalaCompileOptions {
      parallel: true,
      ..Default::default()
    });
    let err = compiler.compile_soup(soup, Vec::new()).unwrap_err();
    assert_eq!(err.kind(), crate::error::HalaGeometryErrorKind::Input);
  }

  #[test]
  fn empty_soup_compiles_to_nothing() {
    let compiler = HalaGeometryCompiler::new(HalaCompileOptions::default());
    let (output, stats) = compiler.compile_soup(HalaTriangleSoup::default(), Vec::new()).unwrap();
    assert!(output.is_empty());
    assert_eq!(stats.num_batches, 0);
  }
}
