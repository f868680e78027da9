//! End-to-end runs through the engine: legend, discovery, overrides, output.

use std::fs;
use std::path::Path;

use lulc_core::{
    lookup, set_override, BackendMode, DiscoveryStatus, EngineConfig, PixelValue, RemapEngine,
    RemapError,
};

fn write_legend(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("legend.csv");
    fs::write(
        &path,
        "Class_ID;Level;Description;Descricao;Color;Grupos;SWAT\n\
         1;1;Water;Agua;#0000ff;Water;WATR\n\
         abc;1;Broken;;;;\n\
         1;1;Duplicate;;;;\n\
         4;2;Urban;Urbano;#ff0000;Built;URBN\n",
    )
    .unwrap();
    path
}

#[test]
fn legend_skips_bad_ids_and_keeps_first_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let table = lookup::load(write_legend(dir.path())).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(1).unwrap().description, "Agua");
    assert_eq!(table.get(4).unwrap().auxiliary_code, "URBN");
}

#[test]
fn dry_run_lists_example_classes_and_writes_text() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("lulc.tif");
    fs::write(&source, b"not really a raster").unwrap();
    let engine = RemapEngine::new(EngineConfig::dry_run()).unwrap();
    let table = lookup::load(write_legend(dir.path())).unwrap();

    let discovery = engine.discover_classes(&source, &table).unwrap();
    assert_eq!(discovery.status, DiscoveryStatus::Simulated(5));
    assert_eq!(discovery.assignments[0].display_name(), "Agua");
    assert_eq!(discovery.assignments[3].display_name(), "Urbano");

    let mut rows = discovery.assignments;
    set_override(&mut rows, PixelValue::from(4), "forest").unwrap();
    let report = engine
        .apply_reclassification(&source, &dir.path().join("results/simulated"), &rows)
        .unwrap();

    assert!(report.simulated);
    assert_eq!(report.format, None);
    let text = fs::read_to_string(dir.path().join("results/simulated.tif")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "SIMULATED RECLASSIFICATION");
    assert_eq!(lines[2], "Mapping:");
    assert_eq!(&lines[3..], ["1 -> 1", "2 -> 2", "3 -> 3", "4 -> forest", "5 -> 5"]);
}

#[test]
fn apply_without_discovery_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let engine = RemapEngine::new(EngineConfig::dry_run()).unwrap();
    let err = engine
        .apply_reclassification(&dir.path().join("in.tif"), &dir.path().join("out.tif"), &[])
        .unwrap_err();
    assert!(matches!(err, RemapError::EmptyAssignment));
    assert!(!dir.path().join("out.tif").exists());
}

#[cfg(feature = "geotiff")]
mod geotiff {
    use super::*;
    use approx::assert_relative_eq;
    use lulc_core::raster::geotiff::{read, write};
    use lulc_core::raster::{GeoMetadata, PixelBuffer, Raster, SampleFormat};
    use lulc_core::LookupTable;

    fn fixture(dir: &Path, pixels: PixelBuffer) -> std::path::PathBuf {
        let path = dir.join("lulc.tif");
        let raster = Raster {
            width: 3,
            height: 2,
            pixels,
            geo: GeoMetadata {
                pixel_scale: Some(vec![30.0, 30.0, 0.0]),
                tiepoints: Some(vec![0.0, 0.0, 0.0, 450_000.0, 7_400_000.0, 0.0]),
                key_directory: Some(vec![1, 1, 0, 1, 3072, 0, 1, 31983]),
                ..Default::default()
            }
            .with_nodata(0.0),
        };
        write(&path, &raster).unwrap();
        path
    }

    fn geotiff_engine() -> RemapEngine {
        RemapEngine::new(EngineConfig {
            mode: BackendMode::GeoTiff,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn overrides_rewrite_pixels_and_keep_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(dir.path(), PixelBuffer::U8(vec![1, 2, 3, 0, 1, 2]));
        let engine = geotiff_engine();
        let table = lookup::load(write_legend(dir.path())).unwrap();

        let discovery = engine.discover_classes(&source, &table).unwrap();
        assert_eq!(discovery.status, DiscoveryStatus::Found(3));
        let names: Vec<&str> = discovery.assignments.iter().map(|a| a.display_name()).collect();
        assert_eq!(names, ["Agua", "Class 2", "Class 3"]);

        let mut rows = discovery.assignments;
        set_override(&mut rows, PixelValue::from(1), "10").unwrap();
        set_override(&mut rows, PixelValue::from(2), "20").unwrap();
        let report = engine
            .apply_reclassification(&source, &dir.path().join("out/reclass"), &rows)
            .unwrap();

        assert_eq!(report.output, dir.path().join("out/reclass.tif"));
        assert_eq!(report.format, Some(SampleFormat::U8));
        assert_eq!(report.changed_pixels, Some(4));
        let out = read(&report.output).unwrap();
        assert_eq!(out.pixels, PixelBuffer::U8(vec![10, 20, 3, 0, 10, 20]));
        assert_eq!(out.geo.nodata_value(), Some(0.0));
        let gt = out.geo.geotransform().unwrap();
        assert_relative_eq!(gt[0], 450_000.0);
        assert_relative_eq!(gt[5], -30.0);
    }

    #[test]
    fn identity_assignments_reproduce_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let pixels = PixelBuffer::I16(vec![-5, 0, 7, 7, 300, -5]);
        let source = fixture(dir.path(), pixels.clone());
        let engine = geotiff_engine();

        let rows = engine.discover_classes(&source, &LookupTable::new()).unwrap().assignments;
        let values: Vec<PixelValue> = rows.iter().map(|a| a.original_value()).collect();
        assert_eq!(values, [-5, 7, 300].map(PixelValue::from));

        let report = engine
            .apply_reclassification(&source, &dir.path().join("same.tif"), &rows)
            .unwrap();
        assert_eq!(report.changed_pixels, Some(0));
        assert_eq!(read(&report.output).unwrap().pixels, pixels);
    }

    #[test]
    fn nodata_only_raster_reports_no_classes() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(dir.path(), PixelBuffer::U8(vec![0; 6]));
        let discovery = geotiff_engine().discover_classes(&source, &LookupTable::new()).unwrap();
        assert_eq!(discovery.status, DiscoveryStatus::NoDataFound);
        assert!(discovery.assignments.is_empty());
    }

    #[test]
    fn out_of_range_targets_widen_the_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(dir.path(), PixelBuffer::U8(vec![1, 2, 1, 0, 2, 1]));
        let engine = geotiff_engine();
        let mut rows = engine.discover_classes(&source, &LookupTable::new()).unwrap().assignments;

        set_override(&mut rows, PixelValue::from(1), "300").unwrap();
        let report = engine
            .apply_reclassification(&source, &dir.path().join("wide.tif"), &rows)
            .unwrap();
        assert_eq!(report.format, Some(SampleFormat::U16));
        assert_eq!(
            read(&report.output).unwrap().pixels,
            PixelBuffer::U16(vec![300, 2, 300, 0, 2, 300])
        );

        set_override(&mut rows, PixelValue::from(1), "-1").unwrap();
        let report = engine
            .apply_reclassification(&source, &dir.path().join("signed.tif"), &rows)
            .unwrap();
        assert_eq!(report.format, Some(SampleFormat::I16));
    }

    #[test]
    fn label_targets_are_rejected_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(dir.path(), PixelBuffer::U8(vec![1, 2, 1, 0, 2, 1]));
        let engine = geotiff_engine();
        let mut rows = engine.discover_classes(&source, &LookupTable::new()).unwrap().assignments;
        set_override(&mut rows, PixelValue::from(2), "pasture").unwrap();

        let out = dir.path().join("never/out.tif");
        let err = engine.apply_reclassification(&source, &out, &rows).unwrap_err();
        assert!(matches!(err, RemapError::NonNumericTarget { .. }));
        assert!(!dir.path().join("never").exists());
    }
}
