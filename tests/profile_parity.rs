mod profile_parity {
    use montage::media::SolidColorSource;
    use montage::{
        AspectRatio, ComposeRequest, Composition, LayerTiming, MediaId, MediaItem, PixelSize,
        Point, RenderProfile, SourceStore, Vec2, compose_frame,
    };

    fn store_with_source(size: PixelSize) -> SourceStore {
        let mut store = SourceStore::new();
        store
            .insert(
                MediaItem::image(MediaId(1), size),
                Box::new(SolidColorSource::new(size, [255, 255, 255, 255])),
            )
            .unwrap();
        store
    }

    fn render(comp: &Composition, store: &mut SourceStore, profile: RenderProfile) -> Vec<u8> {
        let req = ComposeRequest {
            composition: comp,
            canvas: PixelSize::new(32, 32).unwrap(),
            time_secs: 0.5,
            profile,
        };
        compose_frame(&req, store).unwrap().data().to_vec()
    }

    fn coverage_rows(data: &[u8], width: u32) -> (u32, u32) {
        let mut first = u32::MAX;
        let mut last = 0;
        for (i, px) in data.chunks_exact(4).enumerate() {
            // Background is opaque black; the layer is white.
            if px[0] > 0 {
                let y = i as u32 / width;
                first = first.min(y);
                last = last.max(y);
            }
        }
        (first, last)
    }

    #[test]
    fn matching_aspect_renders_identically_in_both_profiles() {
        // Square source in a square frame: fit and fill agree exactly.
        let mut store = store_with_source(PixelSize::new(8, 8).unwrap());
        let mut comp = Composition::new(AspectRatio::Square, false);
        comp.add_layer(
            store.library(),
            MediaId(1),
            Point::new(0.5, 0.5),
            Vec2::new(0.5, 0.5),
            LayerTiming::image(2.0),
        )
        .unwrap();

        let fit = render(&comp, &mut store, RenderProfile::interactive());
        let fill = render(&comp, &mut store, RenderProfile::export());
        assert_eq!(fit, fill);
    }

    #[test]
    fn top_half_placement_lands_in_top_rows_in_both_profiles() {
        // Same y-down convention in preview and export: a layer centered in the top
        // quarter must occupy top rows under both profiles.
        let mut store = store_with_source(PixelSize::new(8, 8).unwrap());
        let mut comp = Composition::new(AspectRatio::Square, false);
        comp.add_layer(
            store.library(),
            MediaId(1),
            Point::new(0.5, 0.25),
            Vec2::new(0.5, 0.25),
            LayerTiming::image(2.0),
        )
        .unwrap();

        for profile in [RenderProfile::interactive(), RenderProfile::export()] {
            let data = render(&comp, &mut store, profile);
            let (first, last) = coverage_rows(&data, 32);
            assert!(first < 8, "layer should start in the top rows, got {first}");
            assert!(last < 16, "layer should stay in the top half, got {last}");
        }
    }

    #[test]
    fn fit_letterboxes_and_fill_covers_on_aspect_mismatch() {
        // Wide 2:1 source in a square layer frame spanning the whole canvas.
        let mut store = store_with_source(PixelSize::new(16, 8).unwrap());
        let mut comp = Composition::new(AspectRatio::Square, false);
        comp.add_layer(
            store.library(),
            MediaId(1),
            Point::new(0.5, 0.5),
            Vec2::new(1.0, 1.0),
            LayerTiming::image(2.0),
        )
        .unwrap();

        let fit = render(&comp, &mut store, RenderProfile::interactive());
        let (first, last) = coverage_rows(&fit, 32);
        // Letterbox bands above and below.
        assert!(first > 0);
        assert!(last < 31);

        let fill = render(&comp, &mut store, RenderProfile::export());
        let (first, last) = coverage_rows(&fill, 32);
        assert_eq!((first, last), (0, 31));
    }
}
