use god::ipc::{self, Request, Response, SocketBuffer};

#[test]
fn handshake_highest_common_version() {
   let negotiated = ipc::negotiate_protocol(&[1, 3, 2, 99]);
   assert_eq!(negotiated, Some(1));
}

#[test]
fn handshake_without_common_version() {
   assert_eq!(ipc::negotiate_protocol(&[]), None);
   assert_eq!(ipc::negotiate_protocol(&[0, 42]), None);
}

#[test]
fn client_hello_advertises_supported_versions() {
   match ipc::client_hello() {
      Request::Hello { protocol_versions, client_version } => {
         assert_eq!(protocol_versions, ipc::PROTOCOL_VERSIONS);
         assert_eq!(client_version, ipc::BINARY_VERSION);
      },
      other => panic!("unexpected hello: {other:?}"),
   }
}

#[tokio::test]
async fn error_response_carries_code_and_message() {
   let err = god::Error::InvalidPosition("main.go".to_string());
   let (mut client, mut server) = tokio::io::duplex(1024);
   SocketBuffer::new()
      .send(&mut server, &Response::from_error(&err))
      .await
      .unwrap();

   let got: Response = SocketBuffer::new().recv(&mut client).await.unwrap();
   match got {
      Response::Error { code, message } => {
         assert_eq!(code, "invalid_position");
         assert!(message.contains("main.go"));
      },
      other => panic!("unexpected response: {other:?}"),
   }
}
