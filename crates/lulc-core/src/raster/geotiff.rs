//! GeoTIFF reading and writing through the pure-Rust `tiff` codec.
//!
//! Only the first band is read. GeoTIFF and GDAL tags are carried as raw
//! values so the output keeps exactly the georeferencing of the input.

use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tiff::{TiffError, TiffResult};
use tracing::{debug, info};

use super::{BackendMode, GeoMetadata, PixelBuffer, Raster, RasterBackend, WriteSummary};
use crate::assignment::ClassAssignment;
use crate::error::{RemapError, Result};
use crate::substitution::SubstitutionTable;
use crate::value::PixelValue;

// ── Tag codes ────────────────────────────────────────────────────────────────

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

/// PlanarConfiguration value for band-sequential storage.
const PLANAR_SEPARATE: u16 = 2;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

// ── Backend ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffBackend;

impl RasterBackend for GeoTiffBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::GeoTiff
    }

    fn class_values(&self, source: &Path) -> Result<Vec<PixelValue>> {
        let raster = read(source)?;
        raster.class_values()
    }

    fn reclassify(
        &self,
        source: &Path,
        output: &Path,
        assignments: &[ClassAssignment],
    ) -> Result<WriteSummary> {
        let table = SubstitutionTable::from_assignments(assignments)?;
        let raster = read(source)?;
        let (pixels, changed) = raster.pixels.remap(&table)?;
        let format = pixels.format();
        if format != raster.pixels.format() {
            info!(from = %raster.pixels.format(), to = %format, "widening output sample type");
        }
        write(output, &raster.with_pixels(pixels))?;
        Ok(WriteSummary {
            format: Some(format),
            changed_pixels: Some(changed),
        })
    }
}

// ── Reading ──────────────────────────────────────────────────────────────────

/// Read the first band of a GeoTIFF along with its georeferencing.
pub fn read(path: &Path) -> Result<Raster> {
    let unavailable = |e: TiffError| RemapError::source_unavailable(path, e);

    let file = File::open(path).map_err(|e| RemapError::source_unavailable(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(unavailable)?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(unavailable)?;
    let geo = read_geo(&mut decoder).map_err(unavailable)?;
    let samples = find_u16(&mut decoder, Tag::SamplesPerPixel)
        .map_err(unavailable)?
        .unwrap_or(1);
    let planar = find_u16(&mut decoder, Tag::PlanarConfiguration)
        .map_err(unavailable)?
        .unwrap_or(1);
    let image = decoder.read_image().map_err(unavailable)?;

    let pixel_count = width as usize * height as usize;
    let mut pixels =
        decoded_pixels(image).map_err(|msg| RemapError::source_unavailable(path, msg))?;
    if pixels.len() != pixel_count {
        pixels = if planar == PLANAR_SEPARATE {
            pixels.truncate(pixel_count)
        } else {
            pixels.first_band(samples as usize)
        };
    }
    if pixels.len() != pixel_count {
        return Err(RemapError::source_unavailable(
            path,
            format!("expected {pixel_count} samples in band 1, decoded {}", pixels.len()),
        ));
    }

    debug!(
        path = %path.display(),
        width,
        height,
        bands = samples,
        format = %pixels.format(),
        geotransform = ?geo.geotransform(),
        "raster read"
    );
    Ok(Raster {
        width,
        height,
        pixels,
        geo,
    })
}

fn find_u16<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> TiffResult<Option<u16>> {
    decoder.find_tag(tag)?.map(|v| v.into_u16()).transpose()
}

fn read_geo<R: Read + Seek>(decoder: &mut Decoder<R>) -> TiffResult<GeoMetadata> {
    let mut doubles = |code| -> TiffResult<Option<Vec<f64>>> {
        decoder.find_tag(tag(code))?.map(|v| v.into_f64_vec()).transpose()
    };
    let pixel_scale = doubles(MODEL_PIXEL_SCALE)?;
    let tiepoints = doubles(MODEL_TIEPOINT)?;
    let transformation = doubles(MODEL_TRANSFORMATION)?;
    let double_params = doubles(GEO_DOUBLE_PARAMS)?;

    let key_directory = decoder
        .find_tag(tag(GEO_KEY_DIRECTORY))?
        .map(|v| v.into_u16_vec())
        .transpose()?;
    let mut text = |code| -> TiffResult<Option<String>> {
        decoder.find_tag(tag(code))?.map(|v| v.into_string()).transpose()
    };
    let ascii_params = text(GEO_ASCII_PARAMS)?;
    let nodata = text(GDAL_NODATA)?;

    Ok(GeoMetadata {
        pixel_scale,
        tiepoints,
        transformation,
        key_directory,
        double_params,
        ascii_params,
        nodata,
    })
}

#[allow(unreachable_patterns)]
fn decoded_pixels(image: DecodingResult) -> std::result::Result<PixelBuffer, &'static str> {
    match image {
        DecodingResult::U8(v) => Ok(PixelBuffer::U8(v)),
        DecodingResult::U16(v) => Ok(PixelBuffer::U16(v)),
        DecodingResult::U32(v) => Ok(PixelBuffer::U32(v)),
        DecodingResult::U64(v) => Ok(PixelBuffer::U64(v)),
        DecodingResult::I8(v) => Ok(PixelBuffer::I8(v)),
        DecodingResult::I16(v) => Ok(PixelBuffer::I16(v)),
        DecodingResult::I32(v) => Ok(PixelBuffer::I32(v)),
        DecodingResult::I64(v) => Ok(PixelBuffer::I64(v)),
        DecodingResult::F32(v) => Ok(PixelBuffer::F32(v)),
        DecodingResult::F64(v) => Ok(PixelBuffer::F64(v)),
        _ => Err("unsupported sample type"),
    }
}

// ── Writing ──────────────────────────────────────────────────────────────────

/// Write `raster` as a single-band GeoTIFF at `path`, replacing any file there.
pub fn write(path: &Path, raster: &Raster) -> Result<()> {
    let unwritable = |e: TiffError| RemapError::unwritable(path, e);

    let mut bytes = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut bytes).map_err(unwritable)?;
        let (w, h, geo) = (raster.width, raster.height, &raster.geo);
        let written = match &raster.pixels {
            PixelBuffer::U8(d) => write_band::<colortype::Gray8, _>(&mut encoder, w, h, geo, d),
            PixelBuffer::U16(d) => write_band::<colortype::Gray16, _>(&mut encoder, w, h, geo, d),
            PixelBuffer::U32(d) => write_band::<colortype::Gray32, _>(&mut encoder, w, h, geo, d),
            PixelBuffer::U64(d) => write_band::<colortype::Gray64, _>(&mut encoder, w, h, geo, d),
            PixelBuffer::I8(d) => write_band::<colortype::GrayI8, _>(&mut encoder, w, h, geo, d),
            PixelBuffer::I16(d) => write_band::<colortype::GrayI16, _>(&mut encoder, w, h, geo, d),
            PixelBuffer::I32(d) => write_band::<colortype::GrayI32, _>(&mut encoder, w, h, geo, d),
            PixelBuffer::I64(d) => write_band::<colortype::GrayI64, _>(&mut encoder, w, h, geo, d),
            PixelBuffer::F32(d) => {
                write_band::<colortype::Gray32Float, _>(&mut encoder, w, h, geo, d)
            }
            PixelBuffer::F64(d) => {
                write_band::<colortype::Gray64Float, _>(&mut encoder, w, h, geo, d)
            }
        };
        written.map_err(unwritable)?;
    }

    fs::write(path, bytes.into_inner()).map_err(|e| RemapError::unwritable(path, e))?;
    debug!(path = %path.display(), format = %raster.pixels.format(), "raster written");
    Ok(())
}

fn write_band<C, W>(
    encoder: &mut TiffEncoder<W>,
    width: u32,
    height: u32,
    geo: &GeoMetadata,
    data: &[C::Inner],
) -> TiffResult<()>
where
    C: ColorType,
    W: Write + Seek,
    [C::Inner]: TiffValue,
{
    let mut image = encoder.new_image::<C>(width, height)?;
    let dir = image.encoder();
    if let Some(v) = &geo.pixel_scale {
        dir.write_tag(tag(MODEL_PIXEL_SCALE), v.as_slice())?;
    }
    if let Some(v) = &geo.tiepoints {
        dir.write_tag(tag(MODEL_TIEPOINT), v.as_slice())?;
    }
    if let Some(v) = &geo.transformation {
        dir.write_tag(tag(MODEL_TRANSFORMATION), v.as_slice())?;
    }
    if let Some(v) = &geo.key_directory {
        dir.write_tag(tag(GEO_KEY_DIRECTORY), v.as_slice())?;
    }
    if let Some(v) = &geo.double_params {
        dir.write_tag(tag(GEO_DOUBLE_PARAMS), v.as_slice())?;
    }
    if let Some(s) = &geo.ascii_params {
        dir.write_tag(tag(GEO_ASCII_PARAMS), s.as_str())?;
    }
    if let Some(s) = &geo.nodata {
        dir.write_tag(tag(GDAL_NODATA), s.as_str())?;
    }
    image.write_data(data)
}
