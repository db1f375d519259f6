// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::Poll;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use shaperpc_contract::{
    AsyncResult, AsyncSequence, CodegenBackend, ContractAnalyzer, ContractDescription,
    InterfaceDescriptor, MethodDescriptor, ServiceContract, TypeDescriptor, type_of,
};
use shaperpc_runtime::{
    CallContext, CallOptions, Channel, ClientErrorDetailFilter, ClientProxy, Code,
    DispatchBackend, Fault, Filter, FilterRegistration, MemoryChannel, Message, MessageStream,
    Metadata, MethodTable, Next, OperationContext, OperationReply, ServerErrorDetailFilter,
    ServiceHost, ServiceHostBuilder, Status, TransportCall, Value, message,
};

// ============================================================================
// Fixture
// ============================================================================

struct CatalogContract;

impl ServiceContract for CatalogContract {
    fn describe() -> InterfaceDescriptor {
        InterfaceDescriptor::new("Catalog")
            .service()
            .method(
                MethodDescriptor::new("LookupAsync", type_of::<AsyncResult<String>>())
                    .param("id", type_of::<i32>())
                    .operation(),
            )
            .method(
                MethodDescriptor::new("Lookup", type_of::<String>()).param("id", type_of::<i32>()),
            )
            .method(
                MethodDescriptor::new("Upload", type_of::<AsyncResult<i32>>())
                    .param("items", type_of::<AsyncSequence<String>>())
                    .param("label", type_of::<String>())
                    .operation(),
            )
            .method(
                MethodDescriptor::new("Range", type_of::<AsyncSequence<i32>>())
                    .param("n", type_of::<i32>())
                    .operation(),
            )
            .method(
                MethodDescriptor::new(
                    "Chat",
                    type_of::<AsyncResult<(i64, AsyncSequence<String>)>>(),
                )
                .param("room", type_of::<String>())
                .param("lines", type_of::<AsyncSequence<String>>())
                .operation(),
            )
            .method(
                MethodDescriptor::new("Ticks", type_of::<AsyncSequence<i32>>())
                    .param("token", TypeDescriptor::named("CancellationToken"))
                    .operation(),
            )
            .method(
                MethodDescriptor::new("Fail", type_of::<AsyncResult<i32>>())
                    .param("id", type_of::<i32>())
                    .operation(),
            )
    }
}

#[derive(Default)]
struct Catalog {
    ticks: Arc<AtomicUsize>,
}

const ITEMS: [&str; 3] = ["anvil", "bolt", "crate"];

fn methods() -> MethodTable<Catalog> {
    MethodTable::new()
        .unary("LookupAsync", |_svc, request: Message, _ctx| async move {
            let id: i32 = request.arg(1)?;
            let item = usize::try_from(id)
                .ok()
                .and_then(|i| ITEMS.get(i))
                .ok_or_else(|| Status::not_found(format!("no item {id}")))?;
            Ok::<_, Status>(message![*item])
        })
        .client_streaming(
            "Upload",
            |_svc, header: Option<Message>, mut items: MessageStream, _ctx| async move {
                let label: String = header
                    .ok_or_else(|| Status::invalid_argument("missing label"))?
                    .arg(1)?;
                if label != "batch" {
                    return Err(Status::invalid_argument(format!("unexpected label {label}")));
                }
                let mut count = 0i32;
                while let Some(item) = items.next().await {
                    let _: String = item?.arg(1)?;
                    count += 1;
                }
                Ok::<_, Status>(message![count])
            },
        )
        .server_streaming("Range", |_svc, request: Message, _ctx| async move {
            let n: i32 = request.arg(1)?;
            if n < 0 {
                // the producer breaks after its first item
                let items = futures::stream::iter(vec![
                    Ok(message![0i32]),
                    Err(Status::aborted("producer broke")),
                ]);
                return Ok(OperationReply::stream(items.boxed()));
            }
            let items = futures::stream::iter((0..n).map(|i| Ok(message![i])));
            Ok::<_, Status>(OperationReply::stream(items.boxed()))
        })
        .duplex(
            "Chat",
            |_svc, header: Option<Message>, lines: MessageStream, _ctx| async move {
                let room: String = header
                    .ok_or_else(|| Status::invalid_argument("missing room"))?
                    .arg(1)?;
                let prefix = room.clone();
                let replies = lines.map(
                    move |line: Result<Message, Status>| -> Result<Message, Status> {
                        let text: String = line?.arg(1)?;
                        Ok(message![format!("{prefix}: {text}")])
                    },
                );
                Ok::<_, Status>(
                    OperationReply::stream(replies.boxed())
                        .with_header(message![room.len() as i64]),
                )
            },
        )
        .server_streaming(
            "Ticks",
            |svc: Arc<Catalog>, _request, _ctx: OperationContext| async move {
                let ticks = svc.ticks.clone();
                let items = async_stream::stream! {
                    let mut i = 0i32;
                    loop {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        ticks.fetch_add(1, Ordering::SeqCst);
                        yield Ok::<_, Status>(message![i]);
                        i += 1;
                    }
                };
                Ok::<_, Status>(OperationReply::stream(items.boxed()))
            },
        )
        .unary("Fail", |_svc, _request, _ctx| async move {
            let fault = Fault::new("OutOfStock", "nothing left").with_detail(Value::Int(7));
            Err::<Message, _>(fault.into_status(Code::FailedPrecondition))
        })
}

struct Harness {
    description: ContractDescription,
    catalog: Arc<Catalog>,
    channel: Arc<MemoryChannel>,
    proxy: ClientProxy,
}

fn harness(
    configure: impl FnOnce(ServiceHostBuilder<Catalog>) -> ServiceHostBuilder<Catalog>,
) -> Harness {
    let description = ContractAnalyzer::default()
        .analyze(&CatalogContract::describe())
        .expect("contract should analyze");
    let table = DispatchBackend::new(methods())
        .generate(&description)
        .expect("all operations are implemented");

    let catalog = Arc::new(Catalog::default());
    let builder = ServiceHost::builder(catalog.clone(), table).filter(FilterRegistration::instance(
        "error-detail",
        i32::MIN,
        Arc::new(ServerErrorDetailFilter),
    ));
    let host = Arc::new(configure(builder).build());
    let channel = Arc::new(MemoryChannel::new(host));

    let proxy = ClientProxy::new(&description, channel.clone()).with_filter(
        FilterRegistration::instance("error-detail", i32::MIN, Arc::new(ClientErrorDetailFilter)),
    );
    Harness {
        description,
        catalog,
        channel,
        proxy,
    }
}

fn requests(values: &[&str]) -> MessageStream {
    let items: Vec<Result<Message, Status>> = values.iter().map(|v| Ok(message![*v])).collect();
    futures::stream::iter(items).boxed()
}

// ============================================================================
// Call shapes
// ============================================================================

#[tokio::test]
async fn test_unary_call() {
    let h = harness(|b| b);
    assert_eq!(h.description.operations().count(), 6);

    let reply = h
        .proxy
        .unary("LookupAsync", message![1i32], CallOptions::new())
        .await
        .unwrap();
    assert_eq!(reply, message!["bolt"]);

    let err = h
        .proxy
        .unary("/Catalog/LookupAsync", message![9i32], CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test]
async fn test_sync_method_uses_async_operation() {
    let h = harness(|b| b);
    let operation = h.proxy.operation("Lookup").unwrap();
    assert_eq!(operation.path(), "/Catalog/LookupAsync");

    let reply = h
        .proxy
        .unary("Lookup", message![2i32], CallOptions::new())
        .await
        .unwrap();
    assert_eq!(reply, message!["crate"]);
}

#[tokio::test]
async fn test_client_streaming_call() {
    let h = harness(|b| b);
    let reply = h
        .proxy
        .client_streaming(
            "Upload",
            Some(message!["batch"]),
            requests(&["a", "b", "c"]),
            CallOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(reply, message![3i32]);

    // the header is mandatory for this operation
    let err = h
        .proxy
        .client_streaming("Upload", None, requests(&["a"]), CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_server_streaming_call() {
    let h = harness(|b| b);
    let response = h
        .proxy
        .server_streaming("Range", message![4i32], CallOptions::new())
        .await
        .unwrap();
    assert!(response.header.is_none());

    let items: Vec<Message> = response
        .messages
        .map(|item| item.unwrap())
        .collect()
        .await;
    assert_eq!(
        items,
        vec![message![0i32], message![1i32], message![2i32], message![3i32]]
    );
}

#[tokio::test]
async fn test_duplex_call_with_headers() {
    let h = harness(|b| b);
    let response = h
        .proxy
        .duplex(
            "Chat",
            Some(message!["lobby"]),
            requests(&["hi", "bye"]),
            CallOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(response.header, Some(message![5i64]));

    let lines: Vec<String> = response
        .messages
        .map(|item| item.unwrap().arg::<String>(1).unwrap())
        .collect()
        .await;
    assert_eq!(lines, vec!["lobby: hi", "lobby: bye"]);
}

#[tokio::test]
async fn test_helper_must_match_shape() {
    let h = harness(|b| b);
    let err = h
        .proxy
        .unary("Range", message![1i32], CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let err = h.proxy.operation("Missing").unwrap_err();
    assert_eq!(err.code(), Code::Unimplemented);
}

#[tokio::test]
async fn test_malformed_request_is_rejected() {
    let h = harness(|b| b);
    let err = h
        .proxy
        .unary("LookupAsync", message!["not a number"], CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_unknown_path_is_unimplemented() {
    let h = harness(|b| b);
    let mut call = h
        .channel
        .start_call("/Catalog/Nope", Metadata::new(), CancellationToken::new())
        .await
        .unwrap();
    let err = call.responses.trailers().await.unwrap_err();
    assert_eq!(err.code(), Code::Unimplemented);
}

// ============================================================================
// Failures, cancellation and deadlines
// ============================================================================

#[tokio::test]
async fn test_fault_detail_reaches_client() {
    let h = harness(|b| b);
    let err = h
        .proxy
        .unary("Fail", message![1i32], CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);

    let fault = err.cause::<Fault>().expect("fault detail should be restored");
    assert_eq!(fault.kind, "OutOfStock");
    assert_eq!(fault.detail, Value::Int(7));
}

#[tokio::test]
async fn test_failing_request_stream_aborts_call() {
    let h = harness(|b| b);
    let items: Vec<Result<Message, Status>> = vec![
        Ok(message!["a"]),
        Err(Status::aborted("producer failed")),
    ];
    let err = h
        .proxy
        .client_streaming(
            "Upload",
            Some(message!["batch"]),
            futures::stream::iter(items).boxed(),
            CallOptions::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Aborted);
}

#[tokio::test]
async fn test_server_stream_fails_after_first_item() {
    let h = harness(|b| b);
    let mut response = h
        .proxy
        .server_streaming("Range", message![-1i32], CallOptions::new())
        .await
        .unwrap();

    assert_eq!(response.messages.next().await.unwrap().unwrap(), message![0i32]);
    let err = response.messages.next().await.unwrap().unwrap_err();
    assert_eq!(err.code(), Code::Aborted);
    assert_eq!(err.message(), Some("producer broke"));
    assert!(response.messages.next().await.is_none());
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_request_stream_released_when_call_ends() {
    let h = harness(|b| b);
    let released = Arc::new(AtomicBool::new(false));
    let flag = DropFlag(released.clone());
    // never yields: only the end of the call can drop it
    let stalled = futures::stream::poll_fn(move |_| {
        let _flag = &flag;
        Poll::<Option<Result<Message, Status>>>::Pending
    })
    .boxed();

    let err = h
        .proxy
        .client_streaming("Upload", Some(message!["other"]), stalled, CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_cancellation_stops_server_stream() {
    let h = harness(|b| b);
    let token = CancellationToken::new();
    let mut response = h
        .proxy
        .server_streaming(
            "Ticks",
            Message::empty(),
            CallOptions::new().with_cancellation(token.clone()),
        )
        .await
        .unwrap();

    for _ in 0..2 {
        assert!(response.messages.next().await.unwrap().is_ok());
    }
    token.cancel();

    let err = response.messages.next().await.unwrap().unwrap_err();
    assert_eq!(err.code(), Code::Cancelled);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let seen = h.catalog.ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.catalog.ticks.load(Ordering::SeqCst), seen);
}

#[tokio::test]
async fn test_deadline_ends_server_stream() {
    let h = harness(|b| b);
    let mut response = h
        .proxy
        .server_streaming(
            "Ticks",
            Message::empty(),
            CallOptions::new().with_timeout(Duration::from_millis(60)),
        )
        .await
        .unwrap();

    let mut received = 0;
    let status = loop {
        match response.messages.next().await {
            Some(Ok(_)) => received += 1,
            Some(Err(status)) => break status,
            None => panic!("stream ended without a status"),
        }
    };
    assert!(received > 0);
    assert_eq!(status.code(), Code::DeadlineExceeded);
}

// ============================================================================
// Filters
// ============================================================================

type Journal = Arc<Mutex<Vec<String>>>;

struct Record(&'static str, Journal);

#[async_trait]
impl Filter for Record {
    async fn invoke(&self, ctx: &mut CallContext, next: Next<'_>) -> Result<(), Status> {
        self.1.lock().push(format!("{} {}", self.0, ctx.path()));
        next.run(ctx).await
    }
}

#[tokio::test]
async fn test_global_and_operation_filters_are_merged() {
    let journal = Journal::default();
    let j = journal.clone();
    let h = harness(move |b| {
        b.filter(FilterRegistration::instance("outer", 0, Arc::new(Record("outer", j.clone()))))
            .operation_filter(
                "/Catalog/Range",
                FilterRegistration::instance("first", -1, Arc::new(Record("first", j.clone()))),
            )
            .filter(FilterRegistration::instance("inner", 5, Arc::new(Record("inner", j))))
    });

    h.proxy
        .unary("LookupAsync", message![0i32], CallOptions::new())
        .await
        .unwrap();
    let response = h
        .proxy
        .server_streaming("Range", message![1i32], CallOptions::new())
        .await
        .unwrap();
    assert_eq!(response.messages.count().await, 1);

    assert_eq!(
        *journal.lock(),
        vec![
            "outer /Catalog/LookupAsync",
            "inner /Catalog/LookupAsync",
            "first /Catalog/Range",
            "outer /Catalog/Range",
            "inner /Catalog/Range",
        ]
    );
}

#[tokio::test]
async fn test_filter_factory_failure_fails_call() {
    let h = harness(|b| {
        b.filter(FilterRegistration::new("broken", 1, |_| {
            Err("no database configured".into())
        }))
    });
    let err = h
        .proxy
        .unary("LookupAsync", message![0i32], CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);
    assert!(err.message().unwrap().contains("filter factory failed"));
    assert!(err.message().unwrap().contains("no database configured"));
}

struct Witness {
    side: &'static str,
    tenant: &'static str,
    journal: Journal,
}

#[async_trait]
impl Filter for Witness {
    async fn invoke(&self, ctx: &mut CallContext, next: Next<'_>) -> Result<(), Status> {
        ctx.request_metadata_mut().insert("x-tenant", self.tenant);
        let result = next.run(ctx).await;
        let seen = match ctx.transport() {
            Some(TransportCall { method, metadata }) => format!(
                "{} {method} {}",
                self.side,
                metadata.get("x-tenant").unwrap_or("-")
            ),
            None => format!("{} no transport", self.side),
        };
        self.journal.lock().push(seen);
        result
    }
}

#[tokio::test]
async fn test_filters_see_transport_call() {
    let journal = Journal::default();
    let server = Witness {
        side: "server",
        tenant: "server-local",
        journal: journal.clone(),
    };
    let h = harness(move |b| {
        b.filter(FilterRegistration::instance("witness", 0, Arc::new(server)))
    });
    let client = Witness {
        side: "client",
        tenant: "globex",
        journal: journal.clone(),
    };
    let proxy = ClientProxy::new(&h.description, h.channel.clone())
        .with_filter(FilterRegistration::instance("witness", 0, Arc::new(client)));

    proxy
        .unary(
            "LookupAsync",
            message![0i32],
            CallOptions::new().with_metadata("x-tenant", "acme"),
        )
        .await
        .unwrap();

    // the transport view keeps what crossed the wire
    assert_eq!(
        *journal.lock(),
        vec![
            "server /Catalog/LookupAsync globex",
            "client /Catalog/LookupAsync globex",
        ]
    );
}
