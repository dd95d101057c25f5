use cudarc::driver::sys::Lib;

// Library names copied from cudarc, in the order it tries them when loading
// the driver itself
fn lib_name_candidates(lib_name: &str) -> Vec<String> {
    use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};

    let pointer_width = if cfg!(target_pointer_width = "32") { "32" } else { "64" };
    let (major, minor) = ("12", "6");

    vec![
        format!("{DLL_PREFIX}{lib_name}{DLL_SUFFIX}"),
        format!("{DLL_PREFIX}{lib_name}{pointer_width}{DLL_SUFFIX}"),
        format!("{DLL_PREFIX}{lib_name}{pointer_width}_{major}{DLL_SUFFIX}"),
        format!("{DLL_PREFIX}{lib_name}{pointer_width}_{major}{minor}{DLL_SUFFIX}"),
        format!("{DLL_PREFIX}{lib_name}{pointer_width}_{major}{minor}_0{DLL_SUFFIX}"),
        format!("{DLL_PREFIX}{lib_name}{pointer_width}_{major}0_{minor}{DLL_SUFFIX}"),
        format!("{DLL_PREFIX}{lib_name}{pointer_width}_10{DLL_SUFFIX}"),
        format!("{DLL_PREFIX}{lib_name}{pointer_width}_{major}0_0{DLL_SUFFIX}"),
        format!("{DLL_PREFIX}{lib_name}{pointer_width}_9{DLL_SUFFIX}"),
        format!("{DLL_PREFIX}{lib_name}{DLL_SUFFIX}.{major}"),
        format!("{DLL_PREFIX}{lib_name}{DLL_SUFFIX}.11"),
        format!("{DLL_PREFIX}{lib_name}{DLL_SUFFIX}.10"),
        format!("{DLL_PREFIX}{lib_name}{DLL_SUFFIX}.1"),
    ]
}

/// Whether the CUDA driver library can be loaded on this host.
///
/// cudarc panics on first use when it cannot find the driver, so this is
/// checked before any call into it.
pub fn cuda_driver_present() -> bool {
    ["cuda", "nvcuda"].iter().flat_map(|name| lib_name_candidates(name)).any(|candidate| {
        // SAFETY: loading the driver runs its initializers, which is what
        // cudarc does on first use anyway
        let lib = unsafe { Lib::new(&candidate) };
        if lib.is_ok() {
            log::trace!("Found CUDA driver as {candidate}");
        }
        lib.is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_start_with_plain_name() {
        let candidates = lib_name_candidates("cuda");
        let expected =
            format!("{}cuda{}", std::env::consts::DLL_PREFIX, std::env::consts::DLL_SUFFIX);
        assert_eq!(candidates[0], expected);
        assert!(candidates.iter().all(|c| c.contains("cuda")));
    }
}
