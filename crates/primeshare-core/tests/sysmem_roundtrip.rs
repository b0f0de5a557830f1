//! Sysmem reference driver: data round trips through export/import

use primeshare_core::{
    DescriptorTable, ExportFlags, Session, SysmemDriver, SysmemObject, PAGE_SIZE,
};
use std::sync::Arc;

#[test]
fn bytes_visible_through_import() {
    let sysmem = Arc::new(SysmemDriver::new());
    let fds = Arc::new(DescriptorTable::new());

    let exporter = Session::new(sysmem.clone(), fds.clone());
    let object = sysmem.create_object(2 * PAGE_SIZE).unwrap();
    object
        .driver_private::<SysmemObject>()
        .unwrap()
        .write(0, b"hello across sessions")
        .unwrap();
    let handle = exporter.create_object(object).unwrap();
    let fd = exporter.export(handle, ExportFlags::default()).unwrap();

    let importer = Session::new(sysmem.clone(), fds);
    let imported = importer.import(fd).unwrap();
    let object = importer.lookup_object(imported).unwrap();

    let view = object.driver_private::<SysmemObject>().unwrap();
    assert_eq!(&view.as_slice()[..21], b"hello across sessions");
}

#[test]
fn import_maps_whole_region() {
    let sysmem = Arc::new(SysmemDriver::new());
    let fds = Arc::new(DescriptorTable::new());

    let exporter = Session::new(sysmem.clone(), fds.clone());
    let handle = exporter
        .create_object(sysmem.create_object(3 * PAGE_SIZE).unwrap())
        .unwrap();
    let fd = exporter.export(handle, ExportFlags::default()).unwrap();

    let importer = Session::new(sysmem.clone(), fds);
    let imported = importer.import(fd).unwrap();
    let object = importer.lookup_object(imported).unwrap();

    let attach = object.import_attachment().unwrap();
    assert_eq!(attach.buffer().size(), 3 * PAGE_SIZE);
    assert_eq!(attach.mapping().unwrap().len(), 3);
}
