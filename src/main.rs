use std::path::{
  Path,
  PathBuf,
};

use anyhow::Context;
use clap::{
  Parser,
  ValueHint,
};

use hala_geometryc::prelude::*;

/// Compile OBJ and glTF meshes into chunked geometry files.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
  /// Input file path (.obj, .gltf or .glb)
  #[arg(short = 'f', long = "file", required_unless_present = "info", value_hint = ValueHint::FilePath)]
  input: Option<PathBuf>,
  /// Output file path
  #[arg(short = 'o', long = "output", required_unless_present = "info", value_hint = ValueHint::FilePath)]
  output: Option<PathBuf>,
  /// JSON compile options, overridden by the flags below
  #[arg(long, value_hint = ValueHint::FilePath)]
  config: Option<PathBuf>,
  /// Scale factor applied to all positions
  #[arg(short, long)]
  scale: Option<f32>,
  /// Reverse the triangle winding
  #[arg(long)]
  ccw: bool,
  /// Negate the V texture coordinate
  #[arg(long)]
  flipv: bool,
  /// Number of steps per axis of the oriented bounding box search
  #[arg(long)]
  obb: Option<u32>,
  /// Normal packing, 0 full precision, 1 packed bytes
  #[arg(long)]
  packnormal: Option<u32>,
  /// Texture coordinate packing, 0 full precision, 1 half floats
  #[arg(long)]
  packuv: Option<u32>,
  /// Calculate tangents, needs normals and texture coordinates
  #[arg(long)]
  tangent: bool,
  /// Add barycentric corner ids
  #[arg(long)]
  barycentric: bool,
  /// Compress the vertex and index streams
  #[arg(short, long)]
  compress: bool,
  /// Post-process and serialize batches in parallel
  #[arg(long)]
  parallel: bool,
  /// Print debug output
  #[arg(short, long)]
  verbose: bool,
  /// Print a summary of a compiled geometry file and exit
  #[arg(long, value_hint = ValueHint::FilePath)]
  info: Option<PathBuf>,
}

impl Cli {
  /// Merge the command line flags over the config file.
  fn compile_options(&self) -> anyhow::Result<HalaCompileOptions> {
    let mut options = match &self.config {
      Some(path) => HalaCompileOptions::from_json_file(path)?,
      None => HalaCompileOptions::default(),
    };
    if let Some(scale) = self.scale {
      options.scale = scale;
    }
    if let Some(obb) = self.obb {
      options.obb_steps = obb;
    }
    if let Some(packing) = self.packnormal {
      options.normal_packing = HalaNormalPacking::from_u32(packing);
    }
    if let Some(packing) = self.packuv {
      options.texcoord_packing = HalaTexcoordPacking::from_u32(packing);
    }
    options.ccw |= self.ccw;
    options.flip_v |= self.flipv;
    options.tangent |= self.tangent;
    options.barycentric |= self.barycentric;
    options.compress |= self.compress;
    options.parallel |= self.parallel;
    Ok(options.sanitized())
  }
}

/// Print the batches of a compiled geometry file.
fn print_info(path: &Path) -> anyhow::Result<()> {
  let data = HalaChunkReader::read_file(path)?;
  let batches = HalaChunkReader::new(&data).read_batches()
    .with_context(|| format!("Parse geometry file \"{:?}\" failed.", path))?;

  println!("{:?}: {} bytes, {} batches", path, data.len(), batches.len());
  for (index, batch) in batches.iter().enumerate() {
    println!("batch {:3}: material \"{}\", {} vertices, {} indices, stride {}, {}",
      index, batch.material, batch.num_vertices, batch.indices.len(), batch.layout.stride,
      if batch.compressed { "compressed" } else { "raw" });
    println!("  sphere center {} radius {:.4}, aabb {} {}",
      batch.bounds.sphere.center, batch.bounds.sphere.radius, batch.bounds.aabb.min, batch.bounds.aabb.max);
    for primitive in batch.primitives.iter() {
      println!("  primitive \"{}\": indices {}+{}, vertices {}+{}",
        primitive.primitive.name,
        primitive.primitive.start_index, primitive.primitive.num_indices,
        primitive.primitive.start_vertex, primitive.primitive.num_vertices);
    }
  }
  Ok(())
}

fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose { "debug" } else { "info" };
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
    .format_timestamp(None)
    .init();

  if let Some(path) = &cli.info {
    return print_info(path);
  }

  let (input, output) = match (&cli.input, &cli.output) {
    (Some(input), Some(output)) => (input, output),
    _ => anyhow::bail!("Both the input (-f) and the output (-o) file must be specified."),
  };
  let options = cli.compile_options()?;
  log::debug!("Compile options: {:?}", options);

  let compiler = HalaGeometryCompiler::new(options);
  compiler.compile_file(input, output)
    .with_context(|| format!("Compile \"{:?}\" into \"{:?}\" failed.", input, output))?;

  Ok(())
}
