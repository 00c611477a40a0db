//! Full persist/reload cycle through the async file layer and the frame
//! allocator, engine- and user-scoped.

use ember_config::{ConfigManager, SVar, SVAR_PERSIST, USER_CONF};
use ember_core::memory::FrameAllocator;
use ember_core::strings::intern;
use ember_core::IoManager;

fn temp_cfg_pair(tag: &str) -> (String, String) {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir();
    (
        dir.join(format!("ember_engine_{tag}_{id}.cfg"))
            .to_string_lossy()
            .into_owned(),
        dir.join(format!("ember_user_{tag}_{id}.cfg"))
            .to_string_lossy()
            .into_owned(),
    )
}

#[test]
fn test_persisted_svars_survive_a_restart() {
    let io = IoManager::new();
    let frame = FrameAllocator::new(64 * 1024);
    let (engine_path, user_path) = temp_cfg_pair("restart");

    // First run: start against missing files, add vars, shut down.
    {
        let mut config = ConfigManager::with_paths(&engine_path, &user_path);
        config.start_up(&io, &frame);

        config.add_svar(SVar::numeric(intern("test_svar1"), 32.0, SVAR_PERSIST));
        config.add_svar(SVar::text(
            intern("test_svar2"),
            intern("hello world"),
            SVAR_PERSIST,
        ));
        config.add_svar(SVar::numeric(
            intern("test_svar3"),
            32.0,
            USER_CONF | SVAR_PERSIST,
        ));
        config.add_svar(SVar::text(
            intern("test_svar4"),
            intern("hello world"),
            USER_CONF | SVAR_PERSIST,
        ));
        // Not persistent: must not reappear next run.
        config.add_svar(SVar::numeric(intern("test_transient"), 1.0, 0));

        config.shut_down(&io, &frame);
    }

    // Second run: everything persistent is back, scoped correctly.
    {
        let mut config = ConfigManager::with_paths(&engine_path, &user_path);
        config.start_up(&io, &frame);

        let sv1 = config.svar(intern("test_svar1")).expect("engine var lost");
        assert_eq!(sv1.float_val(), Some(32.0));

        let sv2 = config.svar(intern("test_svar2")).expect("engine var lost");
        assert_eq!(sv2.str_val(), Some(intern("hello world")));

        let sv3 = config.svar(intern("test_svar3")).expect("user var lost");
        assert_eq!(sv3.float_val(), Some(32.0));
        assert!(sv3.has_flag(USER_CONF));

        let sv4 = config.svar(intern("test_svar4")).expect("user var lost");
        assert_eq!(sv4.str_val(), Some(intern("hello world")));

        assert!(!config.contains_svar(intern("test_transient")));

        // Loaded values never clobber ones added before start_up.
        let mut config_pre = ConfigManager::with_paths(&engine_path, &user_path);
        config_pre.add_svar(SVar::numeric(intern("test_svar1"), 42.0, SVAR_PERSIST));
        config_pre.start_up(&io, &frame);
        assert_eq!(
            config_pre.svar(intern("test_svar1")).unwrap().float_val(),
            Some(42.0)
        );
    }

    std::fs::remove_file(&engine_path).ok();
    std::fs::remove_file(&user_path).ok();
}

#[test]
fn test_record_files_are_whole_records_on_disk() {
    let io = IoManager::new();
    let frame = FrameAllocator::new(64 * 1024);
    let (engine_path, user_path) = temp_cfg_pair("sizes");

    let mut config = ConfigManager::with_paths(&engine_path, &user_path);
    config.start_up(&io, &frame);
    config.add_svar(SVar::numeric(intern("size_check_a"), 1.0, SVAR_PERSIST));
    config.add_svar(SVar::numeric(intern("size_check_b"), 2.0, SVAR_PERSIST));
    config.shut_down(&io, &frame);

    // Headerless record run: size must divide evenly.
    let engine_len = std::fs::metadata(&engine_path).unwrap().len();
    assert_eq!(engine_len % 68, 0);
    assert!(engine_len >= 2 * 68);

    std::fs::remove_file(&engine_path).ok();
    std::fs::remove_file(&user_path).ok();
}
