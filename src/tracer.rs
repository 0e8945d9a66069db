//! Exposes testing, profiling and tracing capabilities.

use crate::system::SystemId;

/// Defines the [`Tracer`] trait and implements it for the [`Log`] and [`Aggregate`] types.
///
/// All tracer method parameters must be [`Copy`].
macro_rules! define_tracer {
    (
        $(
            $(#[$meta:meta])*
            fn $name:ident(&self $(, $arg_ident:ident: $arg_ty:ty)* $(,)?);
        )*
    ) => {
        /// A tracer used for recording the events throughout a system set run.
        ///
        /// Every method has an empty default implementation,
        /// so implementors only override the events they are interested in.
        pub trait Tracer: Sync {
            $(
                $(#[$meta])*
                #[allow(unused_variables)]
                fn $name(&self, $($arg_ident: $arg_ty,)*) {}
            )*
        }

        impl Tracer for Log {
            $(
                fn $name(&self, $($arg_ident: $arg_ty,)*) {
                    log::log!(self.0, concat!(stringify!($name), "(", $(
                        stringify!($arg_ident),
                        " = {",
                        stringify!($arg_ident),
                        ":?}, ",
                    )* ")"), $($arg_ident = $arg_ident,)*);
                }
            )*
        }

        impl_tuple_accumulate! {
            @TYPES (T1, T2, T3, T4, T5, T6, T7, T8);
            $(
                @VARS (t1, t2, t3, t4, t5, t6, t7, t8);
                @METHOD {fn $name(&self, $($arg_ident: $arg_ty,)*);}
            )*
        }
    };
}

macro_rules! impl_tuple {
    (
        @TYPES ($($ty:ident),* $(,)?);
        $(
            @VARS ($($vars:ident),* $(,)?);
            @METHOD {fn $name:ident(&self, $($arg_ident:ident: $arg_ty:ty,)*);}
        )*
    ) => {
        impl<$($ty: Tracer),*> Tracer for Aggregate<($($ty,)*)> {
            $(
                #[allow(unused_variables)]
                fn $name(&self, $($arg_ident: $arg_ty),*) {
                    let Aggregate(($($vars,)*)) = self;
                    dispatch_each!($name; ($($vars),*); ($($arg_ident),*));
                }
            )*
        }
    };
}

/// Calls the same tracer method on each variable with the same arguments.
macro_rules! dispatch_each {
    ($name:ident; ($($vars:ident),*); $args:tt) => {
        $(
            $vars.$name $args;
        )*
    };
}

macro_rules! impl_tuple_accumulate {
    (@TYPES (); $(@VARS (); @METHOD {$($body:tt)*})*) => {
        impl_tuple! {
            @TYPES ();
            $(
                @VARS ();
                @METHOD {$($body)*}
            )*
        }
    };
    (
        @TYPES ($first_ty:ident $(, $rest_ty:ident)* $(,)?);
        $(
            @VARS ($first_var:ident $(, $rest_var:ident)* $(,)?);
            @METHOD {$($body:tt)*}
        )*
    ) => {
        impl_tuple! {
            @TYPES ($first_ty $(, $rest_ty)* );
            $(
                @VARS ($first_var $(, $rest_var)*);
                @METHOD {$($body)*}
            )*
        }

        impl_tuple_accumulate! {
            @TYPES ($($rest_ty),*);
            $(
                @VARS ($($rest_var),*);
                @METHOD {$($body)*}
            )*
        }
    };
}

define_tracer! {
    /// A system set run starts.
    fn start_cycle(&self);

    /// A system set run ends. All systems have completed.
    fn end_cycle(&self);

    /// A thread tries to steal a system, but all systems have started.
    fn steal_return_complete(&self, thread: Thread);

    /// A thread tries to steal a system, but no systems are in the runnable pool.
    fn steal_return_pending(&self, thread: Thread);

    /// A system is marked as runnable because all blockers have been removed.
    fn mark_runnable(&self, system: SystemId);

    /// A system is unmarked as runnable because a system with conflicting access has been stolen.
    fn unmark_runnable(&self, system: SystemId);

    /// A system starts running.
    fn start_run_system(&self, thread: Thread, system: SystemId, debug_name: &str);

    /// A system stops running.
    fn end_run_system(&self, thread: Thread, system: SystemId, debug_name: &str);

    /// A system has completed. Also passes the number of remaining systems.
    fn complete_system(&self, system: SystemId, remaining: usize);
}

/// An empty tracer.
pub struct Noop;

impl Tracer for Noop {}

/// Groups multiple tracers into a tuple and dispatches each call to them in serial.
pub struct Aggregate<T>(
    /// A tuple of child tracers to execute in serial.
    pub T,
);

/// A tracer that logs all events.
pub struct Log(
    /// The log level to log events with.
    pub log::Level,
);

/// The thread ID for a system executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Thread {
    /// The thread that called [`SystemSet::run`](crate::SystemSet::run).
    Main,
    /// A worker thread. The index is in the range `0..concurrency`.
    Worker(usize),
}
