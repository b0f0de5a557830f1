//! Export a buffer from one session and import it twice in another.
//!
//! Run with: cargo run --package primeshare-core --example export_import

use primeshare_core::{DescriptorTable, ExportFlags, Session, SysmemDriver, SysmemObject};
use std::sync::Arc;

fn main() -> primeshare_core::Result<()> {
    let driver = Arc::new(SysmemDriver::new());
    let fds = Arc::new(DescriptorTable::new());

    // Producer session: allocate, fill, export twice.
    let producer = Session::new(driver.clone(), fds.clone());
    let object = driver.create_object(4096)?;
    object
        .driver_private::<SysmemObject>()
        .unwrap()
        .write(0, b"shared payload")?;
    let handle = producer.create_object(object)?;

    let fd_a = producer.export(handle, ExportFlags::CLOEXEC)?;
    let fd_b = producer.export(handle, ExportFlags::CLOEXEC)?;
    println!("exported handle {} as descriptors {} and {}", handle, fd_a, fd_b);

    // Consumer session: both descriptors resolve to one local object.
    let consumer = Session::new(driver.clone(), fds);
    let first = consumer.import(fd_a)?;
    let second = consumer.import(fd_b)?;
    assert_eq!(first, second);
    println!("both descriptors imported as local handle {}", first);

    let imported = consumer.lookup_object(first).unwrap();
    let view = imported.driver_private::<SysmemObject>().unwrap();
    println!(
        "imported contents: {:?}",
        std::str::from_utf8(&view.as_slice()[..14]).unwrap()
    );

    Ok(())
}
