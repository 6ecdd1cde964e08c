use std::{collections::HashMap, sync::Arc};

use eio_core::{Options, TransportType};
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::{ClientConnection, Dialer, runtime::RuntimeHandle, transport::Transport};

pub struct DialerBuilder<R> {
    pub(crate) transports: Vec<Arc<dyn Transport>>,
    pub(crate) headers: HeaderMap,
    pub(crate) query: String,
    pub(crate) auth: HashMap<String, String>,
    pub(crate) options: Options,
    pub(crate) on_connect: Option<crate::dialer::ConnInitializer>,
    pub(crate) runtime: R,
}

impl<R> DialerBuilder<R> {
    pub fn new(runtime: R) -> DialerBuilder<R> {
        DialerBuilder {
            transports: Vec::new(),
            headers: HeaderMap::new(),
            query: String::new(),
            auth: HashMap::new(),
            options: Options::default(),
            on_connect: None,
            runtime,
        }
    }

    pub fn with_runtime<R2: RuntimeHandle>(self, runtime: R2) -> DialerBuilder<R2> {
        DialerBuilder {
            runtime,
            transports: self.transports,
            headers: self.headers,
            query: self.query,
            auth: self.auth,
            options: self.options,
            on_connect: self.on_connect,
        }
    }

    /// Add a transport. Transports added later are preferred over those
    /// added earlier.
    pub fn with_transport<T: Transport>(mut self, transport: T) -> Self {
        self.transports.push(Arc::new(transport));
        self
    }

    pub fn with_shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transports.push(transport);
        self
    }

    /// Add the built-in transports named in `types`, in order.
    ///
    /// Types whose implementation is not compiled in (see the `polling` and
    /// `tungstenite` features) are skipped with a warning.
    pub fn with_transport_types(mut self, types: &[TransportType]) -> Self {
        for transport_type in types {
            match transport_type {
                #[cfg(feature = "polling")]
                TransportType::Polling => {
                    self.transports
                        .push(Arc::new(crate::polling::PollingTransport::new()));
                }
                #[cfg(feature = "tungstenite")]
                TransportType::Websocket => {
                    self.transports
                        .push(Arc::new(crate::websocket::WebsocketTransport::new()));
                }
                #[allow(unreachable_patterns)]
                other => {
                    tracing::warn!(transport=%other, "transport is not compiled in, skipping");
                }
            }
        }
        self
    }

    /// Add the built-in transports listed in the configured [`Options`]
    ///
    /// The default list is `[Polling, Websocket]`, but neither transport is
    /// part of the default feature set. Enable the `polling` and
    /// `tungstenite` features, otherwise nothing is added and `dial` fails
    /// with [`DialError::NoTransportsConfigured`](crate::DialError::NoTransportsConfigured).
    pub fn with_default_transports(self) -> Self {
        let types = self.options.transports.clone();
        self.with_transport_types(&types)
    }

    /// Send an extra header with every transport's connect request
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// A raw query string merged into every dialed URL. Keys here override
    /// keys of the same name in the URL.
    pub fn with_query<S: Into<String>>(mut self, query: S) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_auth<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.auth.insert(key.into(), value.into());
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Run `f` on every new connection before `dial` returns it
    pub fn on_connect<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClientConnection) + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(f));
        self
    }
}

impl<R: RuntimeHandle> DialerBuilder<R> {
    pub fn build(self) -> Dialer<R> {
        Dialer {
            transports: self.transports,
            headers: self.headers,
            query: self.query,
            auth: self.auth,
            options: self.options,
            on_connect: self.on_connect,
            runtime: self.runtime,
        }
    }
}

#[cfg(all(test, feature = "tokio"))]
mod tests {
    use eio_core::TransportType;

    use crate::Dialer;

    #[tokio::test]
    async fn default_transports_follow_enabled_features() {
        let dialer = Dialer::build_tokio().with_default_transports().build();
        let names: Vec<&str> = dialer.transports.iter().map(|t| t.name()).collect();

        let mut expected = Vec::new();
        if cfg!(feature = "polling") {
            expected.push(TransportType::Polling.name());
        }
        if cfg!(feature = "tungstenite") {
            expected.push(TransportType::Websocket.name());
        }
        assert_eq!(names, expected);
    }

    #[cfg(not(any(feature = "polling", feature = "tungstenite")))]
    #[tokio::test]
    async fn no_compiled_transports_means_nothing_to_dial() {
        let dialer = Dialer::build_tokio().with_default_transports().build();
        let err = dialer.dial("http://localhost/engine.io/").await.unwrap_err();
        assert!(matches!(err, crate::DialError::NoTransportsConfigured));
    }
}
