mod export_session {
    use std::sync::mpsc::{Receiver, Sender, channel};
    use std::sync::{Arc, Mutex};

    use montage::{
        AppDefaults, AspectRatio, Composition, ExportOutcome, ExportSession, ExportSettings,
        ExportState, FrameIndex, FrameSink, Fps, InMemorySink, LayerSource, LayerTiming, MediaId,
        MediaItem, MontageResult, PixelFrame, PixelSize, Point, ResolutionTier, SinkConfig,
        SourceStore, Vec2,
    };

    /// Route session log output through the test harness capture.
    fn init_logging() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    /// In-memory sink whose captured state stays observable after the session
    /// consumes it.
    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<InMemorySink>>);

    impl FrameSink for SharedSink {
        fn begin(&mut self, cfg: SinkConfig) -> MontageResult<()> {
            self.0.lock().unwrap().begin(cfg)
        }

        fn push_frame(&mut self, idx: FrameIndex, frame: &PixelFrame) -> MontageResult<()> {
            self.0.lock().unwrap().push_frame(idx, frame)
        }

        fn end(&mut self) -> MontageResult<()> {
            self.0.lock().unwrap().end()
        }

        fn abort(&mut self) -> MontageResult<()> {
            self.0.lock().unwrap().abort()
        }
    }

    fn small_settings() -> ExportSettings {
        ExportSettings {
            tier: ResolutionTier::Standard,
            fps: Fps::new(10, 1).unwrap(),
            overwrite: true,
        }
    }

    fn image_store(size: PixelSize) -> SourceStore {
        struct Solid(PixelFrame);
        impl LayerSource for Solid {
            fn pixel_size(&self) -> PixelSize {
                self.0.size()
            }
            fn frame_at(&mut self, _t: f64) -> MontageResult<Option<PixelFrame>> {
                Ok(Some(self.0.clone()))
            }
        }

        let mut store = SourceStore::new();
        store
            .insert(
                MediaItem::image(MediaId(1), size),
                Box::new(Solid(PixelFrame::solid(size, [200, 40, 40, 255]))),
            )
            .unwrap();
        store
    }

    fn one_image_composition(store: &SourceStore) -> Composition {
        let mut comp = Composition::new(AspectRatio::Square, false);
        comp.add_layer(
            store.library(),
            MediaId(1),
            Point::new(0.5, 0.5),
            Vec2::new(0.5, 0.5),
            LayerTiming::image(2.0),
        )
        .unwrap();
        comp
    }

    #[test]
    fn completed_export_pushes_every_frame() {
        init_logging();
        let store = image_store(PixelSize::new(8, 8).unwrap());
        let comp = one_image_composition(&store);
        let sink = SharedSink::default();
        let captured = sink.0.clone();

        let handle = ExportSession::new(
            &comp,
            store,
            small_settings(),
            AppDefaults::default(),
            Box::new(sink),
        )
        .start();
        let outcome = handle.wait();

        assert_eq!(outcome, ExportOutcome::Completed(None));
        // 2 s image at 10 fps.
        let captured = captured.lock().unwrap();
        assert_eq!(captured.frames().len(), 20);
        let cfg = captured.config().unwrap();
        assert_eq!((cfg.width, cfg.height), (720, 720));
        // Frames arrive in strictly increasing order.
        for (i, (idx, _)) in captured.frames().iter().enumerate() {
            assert_eq!(idx.0, i as u64);
        }
    }

    #[test]
    fn progress_reaches_one_and_state_terminates() {
        use std::time::{Duration, Instant};

        let store = image_store(PixelSize::new(8, 8).unwrap());
        let comp = one_image_composition(&store);

        let handle = ExportSession::new(
            &comp,
            store,
            small_settings(),
            AppDefaults::default(),
            Box::new(SharedSink::default()),
        )
        .start();

        let deadline = Instant::now() + Duration::from_secs(30);
        while !handle.state().is_terminal() {
            assert!(Instant::now() < deadline, "export did not finish in time");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(handle.state(), ExportState::Completed);
        assert_eq!(handle.progress(), 1.0);
        assert_eq!(handle.wait(), ExportOutcome::Completed(None));
    }

    #[test]
    fn empty_composition_exports_default_duration() {
        let store = SourceStore::new();
        let comp = Composition::new(AspectRatio::Square, false);
        let sink = SharedSink::default();
        let captured = sink.0.clone();

        let outcome = ExportSession::new(
            &comp,
            store,
            small_settings(),
            AppDefaults::default(),
            Box::new(sink),
        )
        .start()
        .wait();

        assert_eq!(outcome, ExportOutcome::Completed(None));
        // Default image duration is 3 s at 10 fps.
        assert_eq!(captured.lock().unwrap().frames().len(), 30);
    }

    #[test]
    fn invalid_composition_fails_before_sink_starts() {
        init_logging();
        let store = image_store(PixelSize::new(8, 8).unwrap());
        let comp = one_image_composition(&store);
        // A store missing the referenced media makes timeline building fail.
        let empty_store = SourceStore::new();
        let sink = SharedSink::default();
        let captured = sink.0.clone();

        let outcome = ExportSession::new(
            &comp,
            empty_store,
            small_settings(),
            AppDefaults::default(),
            Box::new(sink),
        )
        .start()
        .wait();

        match outcome {
            ExportOutcome::Failed(reason) => assert!(reason.contains("build failed")),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(captured.lock().unwrap().config().is_none());
    }

    /// Source that hands control to the test between frames: it signals on each
    /// decode and waits to be released, so cancellation lands at a known frame.
    struct GatedSource {
        frame: PixelFrame,
        notify: Sender<()>,
        release: Receiver<()>,
    }

    impl LayerSource for GatedSource {
        fn pixel_size(&self) -> PixelSize {
            self.frame.size()
        }

        fn frame_at(&mut self, _t: f64) -> MontageResult<Option<PixelFrame>> {
            let _ = self.notify.send(());
            let _ = self.release.recv();
            Ok(Some(self.frame.clone()))
        }
    }

    #[test]
    fn cancel_between_frames_yields_cancelled_and_no_artifact() {
        init_logging();
        let size = PixelSize::new(8, 8).unwrap();
        let (notify_tx, notify_rx) = channel();
        let (release_tx, release_rx) = channel();

        let mut store = SourceStore::new();
        store
            .insert(
                MediaItem::image(MediaId(1), size),
                Box::new(GatedSource {
                    frame: PixelFrame::solid(size, [0, 0, 255, 255]),
                    notify: notify_tx,
                    release: release_rx,
                }),
            )
            .unwrap();
        let comp = one_image_composition(&store);

        let sink = SharedSink::default();
        let captured = sink.0.clone();
        let handle = ExportSession::new(
            &comp,
            store,
            small_settings(),
            AppDefaults::default(),
            Box::new(sink),
        )
        .start();

        // Wait for the first frame to start decoding, cancel, then release it. The
        // in-flight frame completes; the loop observes the token before the next one.
        notify_rx.recv().unwrap();
        handle.cancel();
        release_tx.send(()).unwrap();
        drop(release_tx);

        let outcome = handle.wait();
        assert_eq!(outcome, ExportOutcome::Cancelled);
        let captured = captured.lock().unwrap();
        assert!(captured.was_aborted());
        assert!(captured.frames().is_empty());
    }
}
