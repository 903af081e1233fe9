mod endstops;
mod lifecycle;
mod properties;
mod scenarios;
mod support;
