use fieldscope::{Level, LogError, Logger, Scope, SharedBuffer};

#[derive(Debug, thiserror::Error)]
#[error("oops")]
struct HandlerError;

type Handler = Box<dyn Fn(&Scope) -> Result<(), LogError>>;

fn field_middleware(key: &'static str, value: i64, next: Handler) -> Handler {
    Box::new(move |scope: &Scope| next(scope.with_field(key, value)))
}

fn fields_middleware(key: &'static str, value: i64, next: Handler) -> Handler {
    Box::new(move |scope: &Scope| next(scope.with_fields([(key, value)])))
}

fn entry_point(buffer: SharedBuffer, next: Handler) -> impl Fn(&Scope) -> Result<(), LogError> {
    move |scope: &Scope| {
        let logger = Logger::builder()
            .writer(buffer.clone())
            .level(Level::Trace)
            .build();
        let scope = scope.attach(logger);
        scope.with_field("pre", true);

        let result = next(&scope);
        scope.with_field("post", true);

        scope.with_field("defer", true);
        scope
            .logger()
            .with_error_opt(result.as_ref().err().cloned())
            .debug("chain executed");
        result
    }
}

#[test]
fn test_middleware_chain() {
    let buffer = SharedBuffer::new();
    let handler: Handler = Box::new(|scope: &Scope| -> Result<(), LogError> {
        scope.with_field("name", "John");
        scope
            .logger()
            .with_field("bubble-up", false)
            .info("handler called");
        Err(HandlerError.into())
    });
    let chain = entry_point(
        buffer.clone(),
        field_middleware("one", 1, fields_middleware("two", 2, handler)),
    );

    let err = chain(&Scope::new()).unwrap_err();
    assert_eq!(err.to_string(), "oops");

    let lines = buffer.lines();
    assert_eq!(lines.len(), 2);

    let handler_line = &lines[0];
    for expected in [
        "bubble-up=false",
        "pre=true",
        "one=1",
        "two=2",
        "name=John",
        "level=info",
        "msg=\"handler called\"",
    ] {
        assert!(handler_line.contains(expected), "{expected} missing from {handler_line}");
    }
    for unexpected in ["post=", "defer=", "error="] {
        assert!(!handler_line.contains(unexpected), "{unexpected} found in {handler_line}");
    }

    let final_line = &lines[1];
    for expected in [
        "error=oops",
        "pre=true",
        "post=true",
        "defer=true",
        "one=1",
        "two=2",
        "name=John",
        "level=debug",
        "msg=\"chain executed\"",
    ] {
        assert!(final_line.contains(expected), "{expected} missing from {final_line}");
    }
    assert!(!final_line.contains("bubble-up"));
}

#[test]
fn test_error_added_by_inner_layer_reaches_outer_record() {
    let buffer = SharedBuffer::new();
    let scope = Scope::new().attach(Logger::new(buffer.clone()));

    let inner = |scope: &Scope| {
        scope.with_error(HandlerError);
    };
    inner(&scope);
    scope.info("outer");

    assert!(buffer.contents().contains("error=oops"));
}

#[test]
fn test_independent_attach_does_not_bubble_up() {
    let buffer = SharedBuffer::new();
    let outer = Scope::new().attach(Logger::new(buffer.clone()));
    outer.with_field("request", 7);

    {
        let inner = outer.attach(outer.logger());
        inner.with_field("job", "resize");
        inner.info("job done");
    }
    outer.info("request done");

    let lines = buffer.lines();
    assert!(lines[0].contains("request=7") && lines[0].contains("job=resize"));
    assert!(lines[1].contains("request=7") && !lines[1].contains("job="));
}

#[test]
fn test_ceiling_applies_to_scope_helpers() {
    let buffer = SharedBuffer::new();
    let logger = Logger::builder()
        .writer(buffer.clone())
        .level(Level::Info)
        .build();
    let scope = Scope::new().attach(logger);

    scope.debug("hidden without a ceiling");
    scope.with_level(Level::Info);
    scope.debugf(format_args!("shown at {}", "info"));
    scope.warn("unchanged");

    let lines = buffer.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("level=info msg=\"shown at info\""));
    assert!(lines[1].contains("level=warning msg=unchanged"));
}

#[test]
fn test_fields_written_after_snapshot_are_absent_from_it() {
    let buffer = SharedBuffer::new();
    let scope = Scope::new().attach(Logger::new(buffer.clone()));
    let snapshot = scope.logger();
    scope.with_field("later", 1);

    snapshot.info("snapshot");
    scope.info("scope");

    let lines = buffer.lines();
    assert!(!lines[0].contains("later="));
    assert!(lines[1].contains("later=1"));
}
