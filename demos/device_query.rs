use hip::{Device, Result};

fn main() -> Result<()> {
    hip::init()?;
    println!("HIP runtime {}", hip::runtime_version()?);

    let count = hip::device_count()?;
    println!("Found {} device(s)", count);

    for id in 0..count {
        let device = Device::new(id);
        println!("Device {}: {}", id, device.name()?);
        println!("  Compute capability: {}", device.compute_capability()?);
        println!(
            "  Total memory: {} MiB",
            device.total_mem()? / (1024 * 1024)
        );
    }

    Ok(())
}
