//! Drive a [`MainLoop`] from a winit event loop.
//!
//! winit owns the GUI thread, so the main loop cannot block in
//! [`MainLoop::run`]. Instead the application's `ApplicationHandler` calls
//! [`WinitPump::pump`] from `about_to_wait` (and after user events), which
//! runs every due callback and sets the control flow so winit wakes up again
//! in time for the next one. Scheduling from any thread posts a wake-up
//! event through the `EventLoopProxy`.
//!
//! ```ignore
//! impl ApplicationHandler<Wake> for App {
//!     fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
//!         self.pump.pump(event_loop);
//!     }
//!
//!     fn user_event(&mut self, event_loop: &ActiveEventLoop, _event: Wake) {
//!         self.pump.pump(event_loop);
//!     }
//!     // ...
//! }
//! ```

use parking_lot::Mutex;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoopProxy};

use crate::event_loop::MainLoop;

/// Connects a [`MainLoop`] to a winit event loop.
#[derive(Debug)]
pub struct WinitPump {
    main_loop: MainLoop,
}

impl WinitPump {
    /// Install a waker that posts `wake_event` through `proxy` whenever a
    /// callback is scheduled on `main_loop`.
    pub fn new<T>(main_loop: MainLoop, proxy: EventLoopProxy<T>, wake_event: T) -> Self
    where
        T: Clone + Send + 'static,
    {
        let target = Mutex::new((proxy, wake_event));
        main_loop.set_waker(move || {
            let target = target.lock();
            let (proxy, event) = &*target;
            // The event loop may already be gone during shutdown.
            let _ = proxy.send_event(event.clone());
        });
        Self { main_loop }
    }

    /// The loop being pumped.
    pub fn main_loop(&self) -> &MainLoop {
        &self.main_loop
    }

    /// Run due callbacks and set the control flow for the next deadline.
    ///
    /// Returns the number of callbacks executed.
    pub fn pump(&self, event_loop: &ActiveEventLoop) -> usize {
        let count = self.main_loop.process_ready();

        if self.main_loop.should_quit() {
            event_loop.exit();
            return count;
        }

        let control_flow = match self.main_loop.time_until_next() {
            Some(wait) => ControlFlow::wait_duration(wait),
            None => ControlFlow::Wait,
        };
        event_loop.set_control_flow(control_flow);

        count
    }
}

impl Drop for WinitPump {
    fn drop(&mut self) {
        self.main_loop.clear_waker();
    }
}
