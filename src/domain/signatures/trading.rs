//! Order tickets and the selected-order getters.

use super::Row;

pub(super) const ROWS: &[Row] = &[
    (
        "OrderSend",
        "string symbol, int cmd, double volume, double price, int slippage, double stoploss, double takeprofit, [string comment], [int magic], [datetime expiration], [color arrow]",
        "int",
        "Place an order, returns the ticket or -1",
    ),
    ("OrderClose", "int ticket, double lots, double price, int slippage, [color arrow]", "bool", "Close an open order"),
    ("OrderModify", "int ticket, double price, double stoploss, double takeprofit, datetime expiration, [color arrow]", "bool", "Change order prices"),
    ("OrderDelete", "int ticket, [color arrow]", "bool", "Delete a pending order"),
    ("OrderSelect", "int index, int select, [int pool]", "bool", "Select an order by position or ticket"),
    ("OrderTicket", "", "int", "Ticket of the selected order"),
    ("OrderType", "", "int", "Type of the selected order"),
    ("OrderLots", "", "double", "Volume of the selected order"),
    ("OrderSymbol", "", "string", "Symbol of the selected order"),
    ("OrderOpenPrice", "", "double", "Open price of the selected order"),
    ("OrderClosePrice", "", "double", "Close price of the selected order"),
    ("OrderStopLoss", "", "double", "Stop loss of the selected order"),
    ("OrderTakeProfit", "", "double", "Take profit of the selected order"),
    ("OrderOpenTime", "", "datetime", "Open time of the selected order"),
    ("OrderCloseTime", "", "datetime", "Close time of the selected order, 0 while open"),
    ("OrderProfit", "", "double", "Profit of the selected order"),
    ("OrdersTotal", "", "int", "Number of open and pending orders"),
    ("OrdersHistoryTotal", "", "int", "Number of closed orders"),
];
