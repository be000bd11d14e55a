//! Integration test: every sensor built from a valid definition is backed
//! by a buffer of exactly its declared shape and element type, and reads
//! back with that shape no matter what bytes the engine wrote.

use std::sync::Arc;

use proptest::prelude::*;
use simlink_core::SessionId;
use simlink_sensor::{SensorConfig, SensorDefinition, SensorKind, SensorRegistry};
use simlink_shm::{BufferArena, InProcessIpc, IpcBackend, ShmNaming};

fn arena(ipc: &InProcessIpc) -> BufferArena {
    BufferArena::new(
        Arc::new(ipc.clone()),
        ShmNaming::new(SessionId::new("shape")),
    )
}

fn kind_strategy() -> impl Strategy<Value = SensorKind> {
    prop::sample::select(SensorKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn built_buffer_matches_descriptor(kind in kind_strategy()) {
        let ipc = InProcessIpc::new();
        let mut arena = arena(&ipc);
        let registry = SensorRegistry::with_builtin_types();
        let def = SensorDefinition::new("agent", kind.type_name());
        let expected = kind.shape_rule().resolve(&def.name, &def.config).unwrap();

        let sensor = registry.build(&mut arena, def).unwrap();
        prop_assert_eq!(sensor.spec().shape(), &expected);
        prop_assert_eq!(sensor.spec().element(), kind.element());
        prop_assert_eq!(
            arena.bytes(sensor.data_handle()).unwrap().len(),
            sensor.spec().byte_len()
        );
    }

    #[test]
    fn camera_shape_follows_config(width in 1usize..2048, height in 1usize..2048) {
        let registry = SensorRegistry::with_builtin_types();
        let def = SensorDefinition::new("agent", "RGBCamera").config(
            SensorConfig::new()
                .with("CaptureWidth", width as i64)
                .with("CaptureHeight", height as i64),
        );
        let spec = registry.resolve_spec(&def).unwrap();
        prop_assert_eq!(spec.shape().as_slice(), &[height, width, 4]);
    }

    #[test]
    fn garbage_bytes_keep_shape(garbage in prop::collection::vec(any::<u8>(), 12)) {
        let ipc = InProcessIpc::new();
        let mut arena = arena(&ipc);
        let sensor = SensorRegistry::with_builtin_types()
            .build(&mut arena, SensorDefinition::new("agent", "LocationSensor"))
            .unwrap();

        // The "engine" writes arbitrary bytes through its own mapping.
        let os_name = arena.os_name(sensor.data_handle()).unwrap().to_string();
        let mut engine_view = ipc.open_region(&os_name).unwrap();
        engine_view.as_mut_slice()[..12].copy_from_slice(&garbage);

        let reading = sensor.read(&arena).unwrap();
        prop_assert_eq!(reading.shape.as_slice(), &[3]);
        prop_assert_eq!(reading.as_f32().map(<[f32]>::len), Some(3));
    }
}
