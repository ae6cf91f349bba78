use sysinfo::System;

/// Host name for the overview and log header, `"localhost"` if unknown.
pub fn get_hostname() -> String {
    System::host_name()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Memory available to host benchmarks, in bytes.
pub fn available_memory_bytes() -> u64 {
    let mut system = System::new();
    system.refresh_memory();
    system.available_memory()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_is_never_empty() {
        assert!(!get_hostname().is_empty());
    }

    #[test]
    fn test_available_memory_reported() {
        assert!(available_memory_bytes() > 0);
    }
}
