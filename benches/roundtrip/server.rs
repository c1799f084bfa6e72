use std::thread::JoinHandle;

use socketeer::stream::memory::MemoryStream;
use socketeer::ws::{Config, OpCode, Role, Websocket};

/// Echo every data frame back until the client closes.
pub fn start_on_thread(stream: MemoryStream) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut ws = Websocket::from_raw_stream(stream, Role::Server, Config::default()).unwrap();
        while let Ok(frame) = ws.read() {
            match frame.op_code {
                OpCode::Close => break,
                OpCode::Text | OpCode::Binary => ws.write(frame.payload).unwrap(),
                _ => {}
            }
        }
        ws.close().unwrap();
    })
}
