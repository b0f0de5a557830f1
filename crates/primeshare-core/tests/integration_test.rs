//! Cross-process integration tests
//!
//! fork() real child processes to verify that exported backing regions are
//! visible to, and importable by, another process.

#[cfg(all(test, feature = "integration"))]
mod integration {
    use nix::sys::wait::{waitpid, WaitStatus};
    use nix::unistd::{fork, unlink, ForkResult};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use primeshare_core::{
        BufferBacking, DescriptorTable, Session, SharedBuffer, SharedMemory, SysmemDriver,
        SysmemObject, PAGE_SIZE,
    };

    fn unique_name() -> String {
        use std::time::{SystemTime, UNIX_EPOCH};
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("/primeshare_test_{}", ts)
    }

    fn is_exit_success(status: WaitStatus) -> bool {
        matches!(status, WaitStatus::Exited(_, code) if code == 0)
    }

    fn open_with_retry(name: &str) -> SharedMemory {
        let mut attempts = 0;
        loop {
            match SharedMemory::open(name) {
                Ok(region) => return region,
                Err(e) => {
                    attempts += 1;
                    if attempts > 20 {
                        panic!("failed to open region after {} attempts: {:?}", attempts, e);
                    }
                    thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }

    /// A region written by a child process reads back in the parent
    #[test]
    fn test_region_visible_across_processes() {
        let name = unique_name();

        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let mut region = SharedMemory::create(&name, PAGE_SIZE).unwrap();
                let data = b"written by child";
                region.as_mut_slice()[..data.len()].copy_from_slice(data);
                // keep the region alive until the parent has read it
                thread::sleep(Duration::from_millis(500));
                std::process::exit(0);
            }
            ForkResult::Parent { child } => {
                let region = open_with_retry(&name);
                let expected = b"written by child";
                assert_eq!(&region.as_slice()[..expected.len()], expected);

                drop(region);
                let _ = unlink(name.as_str());

                let status = waitpid(child, None).unwrap();
                assert!(is_exit_success(status));
            }
        }
    }

    /// A child-created region imports as a buffer object in the parent
    #[test]
    fn test_import_foreign_region() {
        let name = unique_name();

        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let mut region = SharedMemory::create(&name, 2 * PAGE_SIZE).unwrap();
                region.as_mut_slice()[..4].copy_from_slice(b"ping");
                thread::sleep(Duration::from_millis(500));
                std::process::exit(0);
            }
            ForkResult::Parent { child } => {
                let region = open_with_retry(&name);
                let size = region.size();
                let buffer = SharedBuffer::new(size, BufferBacking::Shm(region));

                let fds = Arc::new(DescriptorTable::new());
                let fd = fds.install(buffer);

                let session = Session::new(Arc::new(SysmemDriver::new()), fds);
                let handle = session.import(fd).unwrap();

                let object = session.lookup_object(handle).unwrap();
                let view = object.driver_private::<SysmemObject>().unwrap();
                assert_eq!(&view.as_slice()[..4], b"ping");
                assert_eq!(session.registry().len(), 1);

                drop(object);
                drop(session);
                let _ = unlink(name.as_str());

                let status = waitpid(child, None).unwrap();
                assert!(is_exit_success(status));
            }
        }
    }
}
