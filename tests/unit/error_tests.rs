use mimic_hostd::AppError;

#[test]
fn display_prefixes_identify_the_failure_domain() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (
            AppError::ConfigCorrupt("blob.json".into()),
            "config corrupt: blob.json",
        ),
        (
            AppError::ConfigUnavailable("timeout".into()),
            "config unavailable: timeout",
        ),
        (AppError::Db("locked".into()), "db: locked"),
        (AppError::Connect("refused".into()), "connect: refused"),
        (AppError::Generate("empty".into()), "generate: empty"),
        (AppError::NotFound("id-1".into()), "not found: id-1"),
        (AppError::Io("denied".into()), "io: denied"),
    ];
    for (err, expected) in cases {
        assert_eq!(format!("{err}"), expected);
    }
}

#[test]
fn converts_from_io_error() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
    let err: AppError = io.into();
    assert!(matches!(err, AppError::Io(_)));
}

#[test]
fn converts_from_toml_error() {
    let toml_err = toml::from_str::<toml::Value>("= nonsense =").unwrap_err();
    let err: AppError = toml_err.into();
    assert!(matches!(err, AppError::Config(_)));
    assert!(format!("{err}").contains("invalid config"));
}

#[test]
fn implements_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&AppError::Db("x".into()));
}
