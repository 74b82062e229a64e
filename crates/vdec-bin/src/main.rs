use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::ffi::c_void;
use std::fs;
use std::path::{Path, PathBuf};
use std::ptr::null_mut;
use vdec_lib::{
    vdec2_create_decoder, vdec2_decode, vdec2_delete_decoder, vdec2_flush,
    vdec2_get_picture_info, vdec2_query_compute_memory_info, vdec2_query_decoder_memory_info,
    vdec_init_logging,
};
use vdec_types::abi::{
    AvcPictureInfo, ComputeMemoryInfo, DecoderConfigInfo, DecoderMemoryInfo, FrameBuffer,
    InputData, OutputInfo, RawDecoder, OK,
};

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Print the memory sizes negotiated for a stream.
    Query {
        #[arg(long, default_value_t = 1920)]
        width: i32,
        #[arg(long, default_value_t = 1080)]
        height: i32,
    },
    /// Push a file through a decoder in fixed-size access units.
    Decode {
        input: PathBuf,
        #[arg(long, default_value_t = 4096)]
        chunk_size: usize,
        #[arg(long, default_value_t = 2)]
        depth: u32,
        #[arg(long, default_value_t = 1920)]
        width: i32,
        #[arg(long, default_value_t = 1080)]
        height: i32,
        /// Write every reported picture here as raw NV12.
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },
}

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn check(call: &str, status: i32) -> Result<()> {
    if status != OK {
        bail!("{} failed with status {:#010x}", call, status as u32);
    }
    Ok(())
}

fn decoder_config(width: i32, height: i32, depth: u32) -> DecoderConfigInfo {
    DecoderConfigInfo {
        max_frame_width: width,
        max_frame_height: height,
        decode_pipeline_depth: depth,
        ..Default::default()
    }
}

fn query_memory(config: &DecoderConfigInfo) -> Result<DecoderMemoryInfo> {
    let mut memory = DecoderMemoryInfo::default();
    check("query decoder memory info", unsafe {
        vdec2_query_decoder_memory_info(config, &mut memory)
    })?;
    Ok(memory)
}

fn query(width: i32, height: i32) -> Result<()> {
    let mut compute = ComputeMemoryInfo::default();
    check("query compute memory info", unsafe {
        vdec2_query_compute_memory_info(&mut compute)
    })?;
    let memory = query_memory(&decoder_config(width, height, 1))?;

    println!("compute queue memory: {} bytes", compute.cpu_gpu_memory_size);
    println!("cpu memory: {} bytes", memory.cpu_memory_size);
    println!("gpu memory: {} bytes", memory.gpu_memory_size);
    println!("cpu/gpu memory: {} bytes", memory.cpu_gpu_memory_size);
    println!(
        "frame buffer: {} bytes, alignment {:#x}",
        memory.max_frame_buffer_size, memory.frame_buffer_alignment
    );
    Ok(())
}

struct Decoder {
    raw: RawDecoder,
    frame_memory: Vec<u8>,
    dump_dir: Option<PathBuf>,
    pictures: usize,
}

impl Decoder {
    fn create(config: &DecoderConfigInfo, dump_dir: Option<PathBuf>) -> Result<Self> {
        let memory = query_memory(config)?;
        let mut raw = null_mut();
        check("create decoder", unsafe {
            vdec2_create_decoder(config, &memory, &mut raw)
        })?;
        Ok(Self {
            raw,
            frame_memory: vec![0u8; memory.max_frame_buffer_size as usize],
            dump_dir,
            pictures: 0,
        })
    }

    fn frame_buffer(&mut self) -> FrameBuffer {
        FrameBuffer {
            frame_buffer: self.frame_memory.as_mut_ptr() as *mut c_void,
            frame_buffer_size: self.frame_memory.len() as u64,
            ..Default::default()
        }
    }

    fn decode(&mut self, unit: &mut [u8], pts: u64) -> Result<()> {
        let input = InputData {
            au_data: unit.as_mut_ptr() as *mut c_void,
            au_size: unit.len() as u64,
            pts_data: pts,
            dts_data: pts,
            ..Default::default()
        };
        let mut frame = self.frame_buffer();
        let mut output = OutputInfo::default();
        check("decode", unsafe {
            vdec2_decode(self.raw, &input, &mut frame, &mut output)
        })?;
        self.report(&output)
    }

    /// Returns false once the pipeline is empty.
    fn flush(&mut self) -> Result<bool> {
        let mut frame = self.frame_buffer();
        let mut output = OutputInfo::default();
        check("flush", unsafe {
            vdec2_flush(self.raw, &mut frame, &mut output)
        })?;
        if output.picture_count == 0 && !output.is_error_frame {
            return Ok(false);
        }
        self.report(&output)?;
        Ok(true)
    }

    fn report(&mut self, output: &OutputInfo) -> Result<()> {
        if output.is_error_frame {
            println!("error frame");
            return Ok(());
        }
        if output.picture_count == 0 {
            return Ok(());
        }

        let mut info = AvcPictureInfo::default();
        check("get picture info", unsafe {
            vdec2_get_picture_info(
                output,
                &mut info as *mut AvcPictureInfo as *mut c_void,
                null_mut(),
            )
        })?;
        println!(
            "picture {}: {}x{} pitch {} pts {} idr {}",
            self.pictures,
            output.frame_width,
            output.frame_height,
            output.frame_pitch,
            info.pts_data,
            info.idr_picture_flag
        );

        if let Some(dir) = &self.dump_dir {
            let path = dir.join(format!("{}.nv12", self.pictures));
            let size = output.frame_buffer_size as usize;
            fs::write(&path, &self.frame_memory[..size])
                .with_context(|| format!("writing {}", path.display()))?;
        }
        self.pictures += 1;
        Ok(())
    }
}

fn delete_decoder(raw: RawDecoder) -> Result<()> {
    check("delete decoder", vdec2_delete_decoder(raw))
}

impl Drop for Decoder {
    fn drop(&mut self) {
        if let Err(e) = delete_decoder(self.raw) {
            warn!("{:#}", e);
        }
    }
}

fn decode(
    input: &Path,
    chunk_size: usize,
    depth: u32,
    width: i32,
    height: i32,
    dump_dir: Option<PathBuf>,
) -> Result<()> {
    if chunk_size == 0 {
        bail!("chunk size must be positive");
    }
    let mut data =
        fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    if let Some(dir) = &dump_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    info!(
        "Decoding {} ({} bytes) in {} byte units",
        input.display(),
        data.len(),
        chunk_size
    );

    let mut decoder = Decoder::create(&decoder_config(width, height, depth), dump_dir)?;
    for (pts, unit) in data.chunks_mut(chunk_size).enumerate() {
        decoder.decode(unit, pts as u64)?;
    }
    while decoder.flush()? {}

    println!("{} pictures", decoder.pictures);
    Ok(())
}

fn main() -> Result<()> {
    vdec_init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Query { width, height } => query(width, height),
        Command::Decode {
            input,
            chunk_size,
            depth,
            width,
            height,
            dump_dir,
        } => decode(&input, chunk_size, depth, width, height, dump_dir),
    }
}
