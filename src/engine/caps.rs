use std::thread;

/// Which build of the transcoding engine to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineVariant {
    SingleThreaded,
    MultiThreaded,
}

impl EngineVariant {
    pub fn display_name(&self) -> &'static str {
        match self {
            EngineVariant::SingleThreaded => "single-threaded",
            EngineVariant::MultiThreaded => "multi-threaded",
        }
    }
}

/// Minimal module in the engine's low-level runtime format (magic + version
/// header). If the runtime can't even compile this, threading support is
/// out of the question.
pub const PROBE_MODULE: [u8; 8] = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];

/// Answers the environment questions the multi-threaded engine variant
/// depends on. Implementations should report honestly and cheaply; the
/// probe treats every failure as "not supported".
pub trait RuntimeProbe: Send + Sync {
    /// Is this the one runtime known to drive the threaded engine reliably?
    fn is_known_good_runtime(&self) -> bool;

    /// Shared-memory buffer primitive available?
    fn has_shared_memory(&self) -> bool;

    /// Atomic-wait primitive available?
    fn has_atomic_wait(&self) -> bool;

    /// Try compiling a minimal probe module.
    fn compile_probe_module(&self, bytes: &[u8]) -> Result<(), String>;
}

/// Capability query for the engine's multi-threaded mode. Every check must
/// hold; any failure anywhere (including a probe-compile error) yields
/// false, never an error.
pub fn supports_multi_threaded_engine(probe: &dyn RuntimeProbe) -> bool {
    if !probe.is_known_good_runtime() {
        return false;
    }
    if !probe.has_shared_memory() {
        return false;
    }
    if !probe.has_atomic_wait() {
        return false;
    }
    probe.compile_probe_module(&PROBE_MODULE).is_ok()
}

pub fn select_variant(probe: &dyn RuntimeProbe) -> EngineVariant {
    if supports_multi_threaded_engine(probe) {
        EngineVariant::MultiThreaded
    } else {
        EngineVariant::SingleThreaded
    }
}

/// Native host probe. Shared memory is only worth reporting when the host
/// actually has more than one unit of parallelism to share it across.
#[derive(Debug, Default)]
pub struct HostProbe;

impl RuntimeProbe for HostProbe {
    fn is_known_good_runtime(&self) -> bool {
        cfg!(any(unix, windows))
    }

    fn has_shared_memory(&self) -> bool {
        thread::available_parallelism()
            .map(|n| n.get() > 1)
            .unwrap_or(false)
    }

    fn has_atomic_wait(&self) -> bool {
        true
    }

    fn compile_probe_module(&self, bytes: &[u8]) -> Result<(), String> {
        // Magic number + version header, nothing else to a minimal module.
        if bytes.len() >= 8 && bytes[..4] == [0x00, 0x61, 0x73, 0x6d] {
            Ok(())
        } else {
            Err("not a module header".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProbe {
        known_good: bool,
        shared_memory: bool,
        atomic_wait: bool,
        compile_ok: bool,
    }

    impl FakeProbe {
        fn all_good() -> Self {
            Self {
                known_good: true,
                shared_memory: true,
                atomic_wait: true,
                compile_ok: true,
            }
        }
    }

    impl RuntimeProbe for FakeProbe {
        fn is_known_good_runtime(&self) -> bool {
            self.known_good
        }
        fn has_shared_memory(&self) -> bool {
            self.shared_memory
        }
        fn has_atomic_wait(&self) -> bool {
            self.atomic_wait
        }
        fn compile_probe_module(&self, _bytes: &[u8]) -> Result<(), String> {
            if self.compile_ok {
                Ok(())
            } else {
                Err("probe compile refused".to_string())
            }
        }
    }

    #[test]
    fn test_all_checks_required() {
        assert!(supports_multi_threaded_engine(&FakeProbe::all_good()));

        for breaker in 0..4 {
            let mut probe = FakeProbe::all_good();
            match breaker {
                0 => probe.known_good = false,
                1 => probe.shared_memory = false,
                2 => probe.atomic_wait = false,
                _ => probe.compile_ok = false,
            }
            assert!(
                !supports_multi_threaded_engine(&probe),
                "check {} should force single-threaded",
                breaker
            );
        }
    }

    #[test]
    fn test_variant_selection() {
        assert_eq!(
            select_variant(&FakeProbe::all_good()),
            EngineVariant::MultiThreaded
        );
        let mut probe = FakeProbe::all_good();
        probe.compile_ok = false;
        assert_eq!(select_variant(&probe), EngineVariant::SingleThreaded);
    }

    #[test]
    fn test_host_probe_accepts_probe_module() {
        let probe = HostProbe;
        assert!(probe.compile_probe_module(&PROBE_MODULE).is_ok());
        assert!(probe.compile_probe_module(&[0xde, 0xad]).is_err());
    }
}
