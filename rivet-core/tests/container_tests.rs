use rivet_core::*;
use std::sync::Arc;

#[derive(Clone)]
struct TestService {
    name: String,
}

struct GreetingController {
    service: Arc<TestService>,
}

impl GreetingController {
    async fn greet(self: Arc<Self>, _args: Arguments) -> Result<String, Error> {
        Ok(format!("hello from {}", self.service.name))
    }
}

impl Controller for GreetingController {
    fn base_path() -> &'static str {
        "/greeting"
    }

    fn handlers() -> Vec<HandlerMethod<Self>> {
        vec![HandlerMethod::get("", "greet", Self::greet)]
    }
}

impl Injectable for GreetingController {
    fn inject(container: &Container) -> Result<Self, Error> {
        Ok(Self {
            service: container.resolve()?,
        })
    }
}

#[test]
fn test_register_and_resolve() {
    let container = Container::new();
    container.register(TestService {
        name: "test".to_string(),
    });

    let resolved = container.resolve::<TestService>().unwrap();
    assert_eq!(resolved.name, "test");
}

#[test]
fn test_resolve_nonexistent() {
    let container = Container::new();
    let result = container.resolve::<TestService>();
    assert!(matches!(result, Err(Error::ProviderNotFound(_))));
}

#[test]
fn test_has_provider() {
    let container = Container::new();
    assert!(!container.has::<TestService>());

    container.register(TestService {
        name: "test".to_string(),
    });
    assert!(container.has::<TestService>());
}

#[test]
fn test_singleton_behavior() {
    let container = Container::new();
    container.register(TestService {
        name: "original".to_string(),
    });

    let resolved1 = container.resolve::<TestService>().unwrap();
    let resolved2 = container.resolve::<TestService>().unwrap();
    assert!(Arc::ptr_eq(&resolved1, &resolved2));
}

#[test]
fn test_clones_share_registry() {
    let container = Container::new();
    let clone = container.clone();
    clone.register(TestService {
        name: "shared".to_string(),
    });
    assert!(container.has::<TestService>());

    container.clear();
    assert!(!clone.has::<TestService>());
}

#[test]
fn test_controllers_are_providers() {
    let container = Container::new();
    container.register(TestService {
        name: "svc".to_string(),
    });

    let controller = container
        .register_injectable_controller::<GreetingController>()
        .unwrap();
    let resolved = container.resolve::<GreetingController>().unwrap();
    assert!(Arc::ptr_eq(&controller, &resolved));

    let controllers = container.controllers();
    assert_eq!(controllers.len(), 1);
    assert_eq!(controllers[0].prefix(), "/greeting");
    assert!(controllers[0].type_name().ends_with("GreetingController"));
}

#[tokio::test]
async fn test_controller_uses_injected_service() {
    let container = Container::new();
    container.register(TestService {
        name: "svc".to_string(),
    });
    container
        .register_injectable_controller::<GreetingController>()
        .unwrap();

    let app = Application::create(container).unwrap();
    let response = app
        .handle(HttpRequest::new("GET".into(), "/greeting".into()))
        .await;
    assert_eq!(response.text(), "hello from svc");
}

#[test]
fn test_clear_removes_controllers() {
    let container = Container::new();
    container.register(TestService {
        name: "svc".to_string(),
    });
    container
        .register_injectable_controller::<GreetingController>()
        .unwrap();

    container.clear();
    assert!(container.controllers().is_empty());
    assert!(!container.has::<GreetingController>());
}
